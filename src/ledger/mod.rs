//! Stake ledger and participant registry.
//!
//! Tracks one [`ParticipantRecord`] per known participant. Records are created
//! on first contact at the configured initial stake, adjusted after every
//! closed round, and never removed.
//!
//! # Concurrency
//!
//! Backed by a [`DashMap`]: every read-modify-write of a stake runs under the
//! entry's shard lock, so concurrent deltas for one participant serialize
//! while different participants proceed independently. All methods take
//! `&self`; share the ledger as `Arc<StakeLedger>`.

pub mod record;

pub use record::ParticipantRecord;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::update::ParticipantId;

/// Stake assigned to a participant on first contact, unless configured otherwise.
pub const DEFAULT_INITIAL_STAKE: f64 = 1000.0;

/// Concurrent per-participant stake ledger.
#[derive(Debug)]
pub struct StakeLedger {
    records: DashMap<ParticipantId, ParticipantRecord>,
    initial_stake: f64,
}

/// Serializable point-in-time copy of a ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Stake given to newly registered participants
    pub initial_stake: f64,
    /// All records, ordered by participant id
    pub records: Vec<ParticipantRecord>,
}

impl Default for StakeLedger {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_STAKE)
    }
}

impl StakeLedger {
    /// Create an empty ledger; new participants start at `initial_stake`.
    pub fn new(initial_stake: f64) -> Self {
        Self {
            records: DashMap::new(),
            initial_stake,
        }
    }

    /// Stake given to newly registered participants.
    pub fn initial_stake(&self) -> f64 {
        self.initial_stake
    }

    /// Create a record for `id` if none exists. Returns `true` if it was created.
    pub fn register(&self, id: &str) -> bool {
        if self.records.contains_key(id) {
            return false;
        }
        let mut created = false;
        self.records.entry(id.to_string()).or_insert_with(|| {
            created = true;
            ParticipantRecord::new(id, self.initial_stake)
        });
        if created {
            tracing::debug!(participant = id, stake = self.initial_stake, "registered participant");
        }
        created
    }

    /// Apply a signed stake delta and return the new stake.
    ///
    /// Unknown participants are registered first. The result is floor-clamped
    /// at zero and appended to the participant's history. Never fails.
    pub fn apply_delta(&self, id: &str, delta: f64) -> f64 {
        let mut record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| ParticipantRecord::new(id, self.initial_stake));
        let before = record.stake;
        let after = record.apply_delta(delta);
        tracing::trace!(participant = id, before, after, delta, "stake updated");
        after
    }

    /// Increase a participant's stake by `amount`.
    pub fn reward(&self, id: &str, amount: f64) -> f64 {
        self.apply_delta(id, amount.abs())
    }

    /// Decrease a participant's stake by `amount` (floored at zero).
    pub fn penalize(&self, id: &str, amount: f64) -> f64 {
        self.apply_delta(id, -amount.abs())
    }

    /// Record that `id` had an update selected in `round`.
    pub fn mark_participated(&self, id: &str, round: u64) {
        if let Some(mut record) = self.records.get_mut(id) {
            record.last_participated_round = Some(round);
        }
    }

    /// Set a participant's contribution score (clamped at zero), registering it if needed.
    pub fn set_contribution_score(&self, id: &str, score: f64) {
        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
        self.records
            .entry(id.to_string())
            .or_insert_with(|| ParticipantRecord::new(id, self.initial_stake))
            .contribution_score = score;
    }

    /// Current stake, or `None` for unknown participants.
    pub fn stake(&self, id: &str) -> Option<f64> {
        self.records.get(id).map(|r| r.stake)
    }

    /// Current contribution score, or `None` for unknown participants.
    pub fn contribution_score(&self, id: &str) -> Option<f64> {
        self.records.get(id).map(|r| r.contribution_score)
    }

    /// Copy of a participant's record.
    pub fn record(&self, id: &str) -> Option<ParticipantRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Whether `id` is known.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All known participant ids, ascending.
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.records.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of known participants.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no participant is known.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all stakes.
    pub fn total_stake(&self) -> f64 {
        let mut stakes: Vec<f64> = self.records.iter().map(|r| r.stake).collect();
        stakes.sort_by(f64::total_cmp);
        stakes.iter().sum()
    }

    /// Mean stake across known participants (0.0 when empty).
    pub fn average_stake(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            n => self.total_stake() / n as f64,
        }
    }

    /// Point-in-time copy of every record.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut records: Vec<ParticipantRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        LedgerSnapshot {
            initial_stake: self.initial_stake,
            records,
        }
    }

    /// Rebuild a ledger from a snapshot.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let ledger = Self::new(snapshot.initial_stake);
        for record in snapshot.records {
            ledger.records.insert(record.participant_id.clone(), record);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_reward_then_penalty_clamps() {
        let ledger = StakeLedger::new(1000.0);
        ledger.reward("a", 100.0);
        ledger.penalize("a", 2000.0);
        let record = ledger.record("a").unwrap();
        assert_eq!(record.stake, 0.0);
        assert_eq!(record.stake_history, vec![1000.0, 1100.0, 0.0]);
    }

    #[test]
    fn test_unknown_participant_created_on_delta() {
        let ledger = StakeLedger::new(50.0);
        assert!(!ledger.contains("new"));
        assert_eq!(ledger.apply_delta("new", -20.0), 30.0);
        assert_eq!(ledger.record("new").unwrap().stake_history, vec![50.0, 30.0]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let ledger = StakeLedger::default();
        assert!(ledger.register("a"));
        assert!(!ledger.register("a"));
        assert_eq!(ledger.stake("a"), Some(DEFAULT_INITIAL_STAKE));
        assert_eq!(ledger.record("a").unwrap().stake_history.len(), 1);
    }

    #[test]
    fn test_penalize_sign_is_fixed() {
        let ledger = StakeLedger::new(100.0);
        assert_eq!(ledger.penalize("a", -10.0), 90.0);
        assert_eq!(ledger.reward("a", -10.0), 100.0);
    }

    #[test]
    fn test_stake_never_negative_random_walk() {
        let mut rng = StdRng::seed_from_u64(7);
        let ledger = StakeLedger::new(10.0);
        for _ in 0..2000 {
            let delta: f64 = rng.gen_range(-50.0..40.0);
            let stake = ledger.apply_delta("walker", delta);
            assert!(stake >= 0.0);
        }
        let record = ledger.record("walker").unwrap();
        assert!(record.stake_history.iter().all(|&s| s >= 0.0));
        assert_eq!(record.stake_history.len(), 2001);
    }

    #[test]
    fn test_concurrent_deltas_not_lost() {
        let ledger = Arc::new(StakeLedger::new(0.0));
        std::thread::scope(|s| {
            for t in 0..8 {
                let ledger = Arc::clone(&ledger);
                s.spawn(move || {
                    for _ in 0..500 {
                        ledger.reward("shared", 1.0);
                        ledger.reward(&format!("own-{}", t), 1.0);
                    }
                });
            }
        });
        assert_eq!(ledger.stake("shared"), Some(4000.0));
        assert_eq!(ledger.record("shared").unwrap().stake_history.len(), 4001);
        for t in 0..8 {
            assert_eq!(ledger.stake(&format!("own-{}", t)), Some(500.0));
        }
    }

    #[test]
    fn test_totals_and_participants() {
        let ledger = StakeLedger::new(100.0);
        ledger.register("b");
        ledger.register("a");
        ledger.reward("c", 50.0);
        assert_eq!(ledger.participants(), vec!["a", "b", "c"]);
        assert_eq!(ledger.total_stake(), 350.0);
        assert!((ledger.average_stake() - 350.0 / 3.0).abs() < 1e-12);
        assert_eq!(StakeLedger::default().average_stake(), 0.0);
    }

    #[test]
    fn test_contribution_score_and_participation() {
        let ledger = StakeLedger::new(10.0);
        ledger.set_contribution_score("a", -3.0);
        assert_eq!(ledger.contribution_score("a"), Some(0.0));
        ledger.mark_participated("a", 4);
        assert_eq!(ledger.record("a").unwrap().last_participated_round, Some(4));
        ledger.mark_participated("ghost", 4);
        assert!(!ledger.contains("ghost"));
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let ledger = StakeLedger::new(1000.0);
        ledger.reward("alice", 25.0);
        ledger.penalize("bob", 300.0);
        ledger.mark_participated("alice", 2);

        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let restored = StakeLedger::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.stake("bob"), Some(700.0));
        assert_eq!(restored.initial_stake(), 1000.0);
    }
}
