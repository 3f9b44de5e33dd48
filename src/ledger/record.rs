//! Per-participant stake record.

use serde::{Deserialize, Serialize};

use crate::update::{ParticipantId, DEFAULT_CONTRIBUTION_SCORE};

/// Persistent state for one participant, owned by the [`StakeLedger`](super::StakeLedger).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Participant this record belongs to
    pub participant_id: ParticipantId,
    /// Current stake, never negative
    pub stake: f64,
    /// Reputation multiplier applied to the stake during aggregation
    pub contribution_score: f64,
    /// Last round in which an update from this participant was selected
    pub last_participated_round: Option<u64>,
    /// Every stake value this record has held, oldest first
    pub stake_history: Vec<f64>,
}

impl ParticipantRecord {
    /// Create a record at `initial_stake` (clamped at zero).
    pub fn new(participant_id: impl Into<ParticipantId>, initial_stake: f64) -> Self {
        let stake = clamp_stake(initial_stake);
        Self {
            participant_id: participant_id.into(),
            stake,
            contribution_score: DEFAULT_CONTRIBUTION_SCORE,
            last_participated_round: None,
            stake_history: vec![stake],
        }
    }

    /// Apply a signed delta, floor-clamp at zero, and append the result to the history.
    ///
    /// Non-finite deltas are absorbed as zero.
    pub fn apply_delta(&mut self, delta: f64) -> f64 {
        let delta = if delta.is_finite() {
            delta
        } else {
            tracing::warn!(
                participant = %self.participant_id,
                delta,
                "ignoring non-finite stake delta"
            );
            0.0
        };
        self.stake = clamp_stake(self.stake + delta);
        self.stake_history.push(self.stake);
        self.stake
    }

    /// Aggregation weight: `stake × contribution_score`.
    pub fn weight(&self) -> f64 {
        self.stake * self.contribution_score
    }
}

fn clamp_stake(stake: f64) -> f64 {
    if stake.is_nan() {
        0.0
    } else {
        stake.clamp(0.0, f64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_history_starts_with_initial() {
        let r = ParticipantRecord::new("a", 1000.0);
        assert_eq!(r.stake, 1000.0);
        assert_eq!(r.stake_history, vec![1000.0]);
        assert_eq!(r.contribution_score, 1.0);
        assert!(r.last_participated_round.is_none());
    }

    #[test]
    fn test_negative_initial_clamped() {
        let r = ParticipantRecord::new("a", -5.0);
        assert_eq!(r.stake, 0.0);
    }

    #[test]
    fn test_reward_then_overdraw() {
        let mut r = ParticipantRecord::new("a", 1000.0);
        assert_eq!(r.apply_delta(100.0), 1100.0);
        assert_eq!(r.apply_delta(-2000.0), 0.0);
        assert_eq!(r.stake_history, vec![1000.0, 1100.0, 0.0]);
    }

    #[test]
    fn test_non_finite_delta_absorbed() {
        let mut r = ParticipantRecord::new("a", 10.0);
        assert_eq!(r.apply_delta(f64::NAN), 10.0);
        assert_eq!(r.apply_delta(f64::NEG_INFINITY), 10.0);
        assert_eq!(r.stake_history.len(), 3);
    }

    #[test]
    fn test_overflow_saturates() {
        let mut r = ParticipantRecord::new("a", f64::MAX);
        assert_eq!(r.apply_delta(f64::MAX), f64::MAX);
    }
}
