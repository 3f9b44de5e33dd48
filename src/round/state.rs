//! Per-round state machine.

use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{AbortReason, RejectReason};
use crate::update::{ParticipantId, Update};

/// Stage of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Raw updates are being gathered
    Collecting,
    /// Updates pass through the validator
    Validating,
    /// Multi-Krum ranks the accepted updates
    Selecting,
    /// The selected subset is reduced to a consensus vector
    Aggregating,
    /// The consensus is handed to the model-state holder
    Applying,
    /// Stakes are adjusted
    Rewarding,
    /// Round completed
    Closed,
    /// Round ended without a consensus
    Aborted,
}

impl RoundPhase {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundPhase::Closed | RoundPhase::Aborted)
    }

    /// The stage after this one on the success path.
    pub fn next(self) -> Option<RoundPhase> {
        use RoundPhase::*;
        match self {
            Collecting => Some(Validating),
            Validating => Some(Selecting),
            Selecting => Some(Aggregating),
            Aggregating => Some(Applying),
            Applying => Some(Rewarding),
            Rewarding => Some(Closed),
            Closed | Aborted => None,
        }
    }

    /// Whether a round in this phase may still abort.
    ///
    /// Once the consensus has been applied the round always closes.
    pub fn can_abort(self) -> bool {
        matches!(
            self,
            RoundPhase::Collecting
                | RoundPhase::Validating
                | RoundPhase::Selecting
                | RoundPhase::Aggregating
                | RoundPhase::Applying
        )
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::Collecting => "collecting",
            RoundPhase::Validating => "validating",
            RoundPhase::Selecting => "selecting",
            RoundPhase::Aggregating => "aggregating",
            RoundPhase::Applying => "applying",
            RoundPhase::Rewarding => "rewarding",
            RoundPhase::Closed => "closed",
            RoundPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// An update the validator turned away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Sender as claimed by the update
    pub participant_id: ParticipantId,
    /// Why it was excluded
    pub reason: RejectReason,
}

/// Everything the orchestrator knows about the round in progress.
#[derive(Clone, Debug)]
pub struct RoundState {
    /// Round being run (1-based)
    pub round_number: u64,
    phase: RoundPhase,
    trail: Vec<RoundPhase>,
    /// Accepted updates, in arrival order
    pub received: Vec<Update>,
    /// Indices into `received` kept by selection, best score first
    pub selected: Vec<usize>,
    /// Krum score per accepted update
    pub scores: Vec<f64>,
    /// Selection could not filter (`n - f - 2 <= 0`)
    pub selection_degenerate: bool,
    /// Consensus vector once aggregated
    pub aggregated_vector: Option<Array1<f64>>,
    /// `|received| / |known participants|`, set when the round closes
    pub participation_rate: f64,
    /// `|received| - |selected|`, set when the round closes
    pub byzantine_suspect_count: usize,
    /// Updates turned away by the validator
    pub rejections: Vec<Rejection>,
    /// Set when the round aborts
    pub abort_reason: Option<AbortReason>,
}

impl RoundState {
    /// Fresh state in the `Collecting` phase.
    pub fn new(round_number: u64) -> Self {
        Self {
            round_number,
            phase: RoundPhase::Collecting,
            trail: vec![RoundPhase::Collecting],
            received: Vec::new(),
            selected: Vec::new(),
            scores: Vec::new(),
            selection_degenerate: false,
            aggregated_vector: None,
            participation_rate: 0.0,
            byzantine_suspect_count: 0,
            rejections: Vec::new(),
            abort_reason: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Every phase entered so far, in order.
    pub fn trail(&self) -> &[RoundPhase] {
        &self.trail
    }

    /// Move to the next phase on the success path. Returns the new phase.
    ///
    /// Terminal states do not advance.
    pub fn advance(&mut self) -> RoundPhase {
        if let Some(next) = self.phase.next() {
            tracing::debug!(round = self.round_number, from = %self.phase, to = %next, "phase transition");
            self.enter(next);
        }
        self.phase
    }

    /// Abort the round. Returns `false` if it is already past the point of no return.
    pub fn abort(&mut self, reason: AbortReason) -> bool {
        if !self.phase.can_abort() {
            return false;
        }
        tracing::debug!(round = self.round_number, from = %self.phase, reason = %reason, "round aborted");
        self.abort_reason = Some(reason);
        self.enter(RoundPhase::Aborted);
        true
    }

    /// Accepted updates kept by selection, best score first.
    pub fn selected_updates(&self) -> Vec<&Update> {
        self.selected.iter().filter_map(|&i| self.received.get(i)).collect()
    }

    /// Participant ids of the selected updates.
    pub fn selected_ids(&self) -> Vec<ParticipantId> {
        self.selected_updates()
            .into_iter()
            .map(|u| u.participant_id.clone())
            .collect()
    }

    fn enter(&mut self, phase: RoundPhase) {
        self.phase = phase;
        self.trail.push(phase);
    }
}
