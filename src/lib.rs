//! # Bastion-FL: Byzantine-tolerant round orchestration for federated learning
//!
//! Bastion-FL turns one round of participant updates into one consensus
//! update while tolerating a bounded number of Byzantine participants, and
//! keeps a stake ledger that rewards the updates that made it through.
//!
//! ## Pipeline
//!
//! - [`UpdateValidator`] - authenticity, round, dimension, finiteness, duplicates
//! - [`pairwise_distances()`] - parallel Euclidean distance matrix
//! - [`select()`] - Multi-Krum selection (`k = n - f - 2`, keeps `max(n - 2f, 1)`)
//! - [`AggregationPolicy`] - mean, stake-weighted median, stake-weighted trimmed mean
//! - [`StakeLedger`] - per-participant stake, floored at zero, with history
//!
//! ## High-Level API
//!
//! Use [`RoundOrchestrator`] to drive whole rounds:
//!
//! ```rust
//! use std::sync::Arc;
//! use bastion_fl::{AcceptAll, InMemoryModel, RoundConfig, RoundOrchestrator, Update};
//! use ndarray::array;
//!
//! let mut config = RoundConfig::new(2);
//! config.assumed_byzantine = 1;
//! let mut orchestrator = RoundOrchestrator::with_new_ledger(
//!     config,
//!     Arc::new(AcceptAll),
//!     Box::new(InMemoryModel::default()),
//! )
//! .unwrap();
//!
//! let updates = vec![
//!     Update::new("a", 1, array![1.0, 1.0]),
//!     Update::new("b", 1, array![1.0, 1.0]),
//!     Update::new("c", 1, array![1.0, 1.0]),
//!     Update::new("d", 1, array![1.0, 1.0]),
//!     Update::new("evil", 1, array![500.0, -500.0]),
//! ];
//! let report = orchestrator.run_round(updates);
//! assert_eq!(report.consensus(), Some(&array![1.0, 1.0]));
//! assert!(!report.summary.selected.contains(&"evil".to_string()));
//! ```

#![deny(missing_docs)]

pub mod aggregators;
pub mod auth;
pub mod config;
pub mod distance;
pub mod error;
pub mod ledger;
pub mod math;
pub mod round;
pub mod selection;
pub mod update;
pub mod validation;

// Re-exports
pub use aggregators::{mean, weighted_median, weighted_trimmed_mean, AggregationPolicy};
pub use auth::{AcceptAll, Authenticator, DigestAuthenticator};
pub use config::{CollectionPolicy, RoundConfig, StakeSource};
pub use distance::pairwise_distances;
pub use error::{AbortReason, BastionError, RejectReason};
pub use ledger::{LedgerSnapshot, ParticipantRecord, StakeLedger};
pub use round::{
    AuditLog, CancellationFlag, Inbox, InMemoryModel, ModelStateHolder, RoundObserver, RoundOrchestrator,
    RoundPhase, RoundReport, RoundState, RoundSummary,
};
pub use selection::{select, select_updates, Selection};
pub use update::{ParticipantId, Update};
pub use validation::{UpdateValidator, Verdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
