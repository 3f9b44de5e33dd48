//! Round summaries and the audit log.
//!
//! Every finished round, closed or aborted, yields one [`RoundSummary`]. The
//! orchestrator appends it to its [`AuditLog`] and hands it to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{Rejection, RoundPhase};
use crate::error::AbortReason;
use crate::update::ParticipantId;

/// Outcome and metrics of one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number (1-based)
    pub round_number: u64,
    /// Final phase: `Closed` or `Aborted`
    pub phase: RoundPhase,
    /// Why the round aborted, if it did
    pub abort_reason: Option<AbortReason>,
    /// Raw updates handed to the round
    pub collected: usize,
    /// Updates accepted by the validator
    pub accepted: usize,
    /// Updates turned away, with reasons
    pub rejections: Vec<Rejection>,
    /// Participants whose updates were selected, best score first
    pub selected: Vec<ParticipantId>,
    /// Accepted but not selected
    pub byzantine_suspect_count: usize,
    /// Accepted updates over known participants
    pub participation_rate: f64,
    /// Selection kept everything because `n - f - 2 <= 0`
    pub selection_degenerate: bool,
    /// Aggregation policy name
    pub policy: String,
    /// Participants whose reported privacy budget exceeded the ceiling
    pub over_budget: Vec<ParticipantId>,
    /// Sum of ledger stakes after the round
    pub total_stake: f64,
    /// Mean ledger stake after the round
    pub average_stake: f64,
    /// When the round started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Phases entered, in order
    pub trail: Vec<RoundPhase>,
}

impl RoundSummary {
    /// Whether the round closed with a consensus.
    pub fn succeeded(&self) -> bool {
        self.phase == RoundPhase::Closed
    }

    /// Number of rejected updates.
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

/// Append-only log of round summaries.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<RoundSummary>,
}

impl AuditLog {
    /// Create a new, empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a summary.
    pub fn push(&mut self, summary: RoundSummary) {
        self.entries.push(summary);
    }

    /// All summaries, oldest first.
    pub fn entries(&self) -> &[RoundSummary] {
        &self.entries
    }

    /// Most recent summary.
    pub fn last(&self) -> Option<&RoundSummary> {
        self.entries.last()
    }

    /// Number of recorded rounds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rounds that aborted.
    pub fn aborted(&self) -> impl Iterator<Item = &RoundSummary> {
        self.entries.iter().filter(|s| !s.succeeded())
    }

    /// Serialize the log to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
