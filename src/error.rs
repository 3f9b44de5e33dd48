//! Error types for Bastion-FL
//!
//! Three layers, matching how far a failure reaches:
//!
//! - [`RejectReason`]: one update is excluded, the round goes on.
//! - [`AbortReason`]: the current round is aborted, the ledger is untouched.
//! - [`BastionError`]: a call-level failure from a building block
//!   (distance engine, selector, aggregator, configuration).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Call-level errors returned by the aggregation building blocks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BastionError {
    /// No updates were provided
    #[error("Empty updates provided")]
    EmptyUpdates,

    /// Vectors have inconsistent dimensions
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the first vector (or the configured dimension)
        expected: usize,
        /// Dimension of the offending vector
        actual: usize,
    },

    /// Too few updates to run the requested step
    #[error("Insufficient updates: need {needed}, got {actual}")]
    InsufficientUpdates {
        /// Minimum required updates
        needed: usize,
        /// Updates actually available
        actual: usize,
    },

    /// Every aggregation weight is zero
    #[error("Total aggregation weight is zero")]
    ZeroTotalWeight,

    /// A weight is negative or not finite
    #[error("Weights must be finite and non-negative")]
    InvalidWeights,

    /// Trim fraction is outside valid range
    #[error("Invalid trim fraction: {0} (must be in [0.0, 0.5))")]
    InvalidTrimFraction(f64),

    /// Input slices that must line up do not
    #[error("Length mismatch: {what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the mismatched input
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a single update was excluded from a round.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Update targets a different round
    #[error("round mismatch: expected {expected}, got {actual}")]
    RoundMismatch {
        /// Round currently being collected
        expected: u64,
        /// Round stamped on the update
        actual: u64,
    },

    /// Update vector has the wrong dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Model dimension for this round
        expected: usize,
        /// Length of the submitted vector
        actual: usize,
    },

    /// Authentication tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Participant already has an accepted update this round
    #[error("duplicate update for this round")]
    Duplicate,

    /// Vector contains NaN or infinite entries
    #[error("non-finite value at coordinate {index}")]
    NonFiniteValue {
        /// First offending coordinate
        index: usize,
    },

    /// Stake or contribution score is negative or not finite, or their product overflows
    #[error("invalid weight: stake {stake}, contribution score {contribution_score}")]
    InvalidWeight {
        /// Reported stake
        stake: f64,
        /// Reported contribution score
        contribution_score: f64,
    },

    /// Update L2 norm is above the configured bound
    #[error("update norm {norm:.4} exceeds bound {bound:.4}")]
    NormExceeded {
        /// Norm of the submitted vector
        norm: f64,
        /// Configured bound
        bound: f64,
    },

    /// Participant was flagged over its privacy budget last round
    #[error("excluded: privacy budget exceeded in an earlier round")]
    PrivacyBudgetExceeded,
}

/// Why a round ended in the `Aborted` state.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Fewer accepted updates than the round needs
    #[error("insufficient updates: need {needed}, got {actual}")]
    InsufficientUpdates {
        /// Minimum accepted updates
        needed: usize,
        /// Accepted updates
        actual: usize,
    },

    /// The aggregator produced no consensus vector
    #[error("aggregation failed: {reason}")]
    AggregationFailed {
        /// Underlying aggregator error
        reason: String,
    },

    /// The model-state holder refused the consensus vector
    #[error("model-state holder failed to apply consensus: {reason}")]
    ApplyFailed {
        /// Error reported by the holder
        reason: String,
    },

    /// The round was cancelled before the consensus was applied
    #[error("round cancelled")]
    Cancelled,
}
