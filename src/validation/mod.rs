//! Update validation.
//!
//! Every collected update passes through [`UpdateValidator`] before it can
//! influence selection or aggregation:
//!
//! - authenticity via the pluggable [`Authenticator`]
//! - round number and dimension
//! - finite coordinates, non-negative weights, optional [`norm_bound`]
//! - at most one accepted update per participant per round
//!
//! The validator holds no round state. [`UpdateValidator::check`] covers
//! everything except duplicates and may run concurrently; the duplicate
//! check in [`UpdateValidator::validate`] reads the caller's accepted set.

pub mod norm_bound;

pub use norm_bound::{check_finite, check_norm_bound};

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::error::RejectReason;
use crate::update::{ParticipantId, Update};

/// Outcome of validating one update.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Update may enter the round
    Accepted,
    /// Update is excluded
    Rejected(RejectReason),
}

impl Verdict {
    /// Whether the update was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

impl From<Result<(), RejectReason>> for Verdict {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Verdict::Accepted,
            Err(reason) => Verdict::Rejected(reason),
        }
    }
}

/// Authenticates and sanity-checks incoming updates.
#[derive(Clone)]
pub struct UpdateValidator {
    authenticator: Arc<dyn Authenticator>,
    max_norm: Option<f64>,
}

impl UpdateValidator {
    /// Create a validator around an authenticity capability.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            max_norm: None,
        }
    }

    /// Reject updates whose L2 norm exceeds `max_norm`.
    pub fn with_max_norm(mut self, max_norm: Option<f64>) -> Self {
        self.max_norm = max_norm;
        self
    }

    /// Stateless checks: everything except duplicate detection.
    ///
    /// Authenticity is checked first, so any other rejection reason implies
    /// the sender's identity was verified.
    pub fn check(&self, update: &Update, expected_round: u64, expected_dimension: usize) -> Verdict {
        self.check_inner(update, expected_round, expected_dimension).into()
    }

    /// Full validation against the participants already accepted this round.
    pub fn validate(
        &self,
        update: &Update,
        expected_round: u64,
        expected_dimension: usize,
        accepted: &BTreeSet<ParticipantId>,
    ) -> Verdict {
        match self.check(update, expected_round, expected_dimension) {
            Verdict::Accepted => Self::check_duplicate(update, accepted).into(),
            rejected => rejected,
        }
    }

    /// Duplicate detection on its own, for callers that ran [`check`](Self::check) separately.
    pub fn check_duplicate(update: &Update, accepted: &BTreeSet<ParticipantId>) -> Result<(), RejectReason> {
        if accepted.contains(&update.participant_id) {
            Err(RejectReason::Duplicate)
        } else {
            Ok(())
        }
    }

    fn check_inner(
        &self,
        update: &Update,
        expected_round: u64,
        expected_dimension: usize,
    ) -> Result<(), RejectReason> {
        if !self.authenticator.verify(
            &update.participant_id,
            update.round_number,
            &update.authentication_tag,
        ) {
            return Err(RejectReason::AuthenticationFailed);
        }

        if update.round_number != expected_round {
            return Err(RejectReason::RoundMismatch {
                expected: expected_round,
                actual: update.round_number,
            });
        }

        if update.dimension() != expected_dimension {
            return Err(RejectReason::DimensionMismatch {
                expected: expected_dimension,
                actual: update.dimension(),
            });
        }

        check_finite(update.view())?;

        let valid_weight = |w: f64| w.is_finite() && w >= 0.0;
        if !valid_weight(update.stake)
            || !valid_weight(update.contribution_score)
            || !(update.stake * update.contribution_score).is_finite()
        {
            return Err(RejectReason::InvalidWeight {
                stake: update.stake,
                contribution_score: update.contribution_score,
            });
        }

        if let Some(bound) = self.max_norm {
            check_norm_bound(update.view(), bound)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for UpdateValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateValidator")
            .field("max_norm", &self.max_norm)
            .finish_non_exhaustive()
    }
}
