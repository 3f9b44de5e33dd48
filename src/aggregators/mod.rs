//! Robust reduction of the selected subset to one consensus vector.
//!
//! | Policy | Weighting | Role |
//! |--------|-----------|------|
//! | [`mean`] | none | FedAvg over the Multi-Krum survivors |
//! | [`weighted_median`] | stake × contribution | defence in depth if selection under-filters |
//! | [`weighted_trimmed_mean`] | stake × contribution | median-like robustness with less variance |
//!
//! All reductions run in `f64`, parallelize over coordinates with rayon, and
//! are invariant to the order of their inputs.

pub mod mean;
pub mod weighted_median;
pub mod weighted_trimmed_mean;

pub use mean::mean;
pub use weighted_median::weighted_median;
pub use weighted_trimmed_mean::{check_trim_fraction, weighted_trimmed_mean};

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::BastionError;
use crate::update::Update;

/// Minimum number of selected updates a consensus is built from.
pub const MIN_AGGREGATION_INPUTS: usize = 2;

/// Aggregation policy, resolved once per deployment from configuration.
///
/// # Example
///
/// ```rust
/// use bastion_fl::{AggregationPolicy, Update};
/// use ndarray::array;
///
/// let updates = vec![
///     Update::new("a", 1, array![1.0, 2.0]).with_stake(100.0),
///     Update::new("b", 1, array![1.2, 2.2]).with_stake(100.0),
///     Update::new("c", 1, array![900.0, -900.0]).with_stake(1.0),
/// ];
/// let selected: Vec<&Update> = updates.iter().collect();
///
/// let consensus = AggregationPolicy::StakeWeightedMedian
///     .aggregate(&selected)
///     .unwrap();
/// assert_eq!(consensus, array![1.2, 2.0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Coordinate-wise mean of the selected subset
    #[default]
    Mean,
    /// Coordinate-wise median weighted by `stake × contribution_score`
    StakeWeightedMedian,
    /// Coordinate-wise trimmed mean weighted by `stake × contribution_score`
    StakeWeightedTrimmedMean {
        /// Share of total weight trimmed from each tail, in `[0.0, 0.5)`
        trim_fraction: f64,
    },
}

impl AggregationPolicy {
    /// Short name for logs and audit entries.
    pub fn name(&self) -> &'static str {
        match self {
            AggregationPolicy::Mean => "mean",
            AggregationPolicy::StakeWeightedMedian => "stake_weighted_median",
            AggregationPolicy::StakeWeightedTrimmedMean { .. } => "stake_weighted_trimmed_mean",
        }
    }

    /// Check policy parameters.
    pub fn validate(&self) -> Result<(), BastionError> {
        match self {
            AggregationPolicy::StakeWeightedTrimmedMean { trim_fraction } => {
                check_trim_fraction(*trim_fraction)
            }
            _ => Ok(()),
        }
    }

    /// Reduce the selected updates, reporting why no consensus was possible.
    ///
    /// # Errors
    ///
    /// * [`BastionError::InsufficientUpdates`] with fewer than two updates
    /// * [`BastionError::ZeroTotalWeight`] if every `stake × contribution_score` is zero,
    ///   for every policy including [`Mean`](AggregationPolicy::Mean)
    /// * [`BastionError::InvalidWeights`] if a weight is negative or NaN
    /// * [`BastionError::DimensionMismatch`] if the updates disagree on dimension
    pub fn try_aggregate(&self, selected: &[&Update]) -> Result<Array1<f64>, BastionError> {
        if selected.len() < MIN_AGGREGATION_INPUTS {
            return Err(BastionError::InsufficientUpdates {
                needed: MIN_AGGREGATION_INPUTS,
                actual: selected.len(),
            });
        }

        let weights = update_weights(selected);
        // A subset nobody stakes on yields no consensus, whatever the policy.
        normalize_weights(&weights, selected.len())?;

        let vectors: Vec<ArrayView1<'_, f64>> = selected.iter().map(|u| u.view()).collect();
        match self {
            AggregationPolicy::Mean => mean(&vectors),
            AggregationPolicy::StakeWeightedMedian => weighted_median(&vectors, &weights),
            AggregationPolicy::StakeWeightedTrimmedMean { trim_fraction } => {
                weighted_trimmed_mean(&vectors, &weights, *trim_fraction)
            }
        }
    }

    /// Reduce the selected updates; `None` when no consensus is possible.
    pub fn aggregate(&self, selected: &[&Update]) -> Option<Array1<f64>> {
        match self.try_aggregate(selected) {
            Ok(consensus) => Some(consensus),
            Err(e) => {
                tracing::debug!(policy = self.name(), error = %e, "aggregation produced no consensus");
                None
            }
        }
    }
}

fn update_weights(updates: &[&Update]) -> Vec<f64> {
    updates.iter().map(|u| u.weight()).collect()
}

/// Check that vectors are non-empty and share one dimension; return it.
pub(crate) fn check_dimensions(vectors: &[ArrayView1<'_, f64>]) -> Result<usize, BastionError> {
    let first = vectors.first().ok_or(BastionError::EmptyUpdates)?;
    let dim = first.len();
    for v in &vectors[1..] {
        if v.len() != dim {
            return Err(BastionError::DimensionMismatch {
                expected: dim,
                actual: v.len(),
            });
        }
    }
    Ok(dim)
}

/// Normalize non-negative weights to sum to one.
///
/// Weights are first scaled by the largest one, so the total stays finite for
/// any finite input. The total is summed in sorted order so normalization is
/// order-invariant.
pub(crate) fn normalize_weights(weights: &[f64], expected: usize) -> Result<Vec<f64>, BastionError> {
    if weights.len() != expected {
        return Err(BastionError::LengthMismatch {
            what: "weights",
            expected,
            actual: weights.len(),
        });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(BastionError::InvalidWeights);
    }

    let max = weights.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Err(BastionError::ZeroTotalWeight);
    }

    let scaled: Vec<f64> = weights.iter().map(|w| w / max).collect();
    let mut sorted = scaled.clone();
    sorted.sort_by(f64::total_cmp);
    let total: f64 = sorted.iter().sum();

    Ok(scaled.into_iter().map(|w| w / total).collect())
}

/// `(value, weight)` pairs for one coordinate, sorted by value then weight.
pub(crate) fn sorted_pairs(vectors: &[ArrayView1<'_, f64>], weights: &[f64], coord: usize) -> Vec<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = vectors
        .iter()
        .zip(weights.iter())
        .map(|(v, &w)| (v[coord], w))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pairs
}
