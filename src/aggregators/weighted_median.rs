//! Stake-weighted coordinate-wise median.
//!
//! A single extreme coordinate cannot move a median the way it moves a mean,
//! so this stays robust even when selection under-filters. Each update's
//! weight is `stake × contribution_score`, normalized to sum to one.

use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;

use super::{check_dimensions, normalize_weights, sorted_pairs};
use crate::error::BastionError;

/// Cumulative weights within this distance of one half count as an exact split.
const HALF_EPSILON: f64 = 1e-12;

/// Coordinate-wise weighted median.
///
/// For each coordinate, values are ordered ascending and the median is the
/// first value whose cumulative weight reaches one half. When the cumulative
/// weight lands exactly on one half, the result is the midpoint between that
/// value and the next positively-weighted one, so equal weights give the
/// ordinary median.
///
/// # Arguments
///
/// * `vectors` - Update vectors (one per participant)
/// * `weights` - Non-negative weight per vector
pub fn weighted_median(vectors: &[ArrayView1<'_, f64>], weights: &[f64]) -> Result<Array1<f64>, BastionError> {
    let dim = check_dimensions(vectors)?;
    let weights = normalize_weights(weights, vectors.len())?;

    let result: Option<Vec<f64>> = (0..dim)
        .into_par_iter()
        .map(|coord| {
            let pairs = sorted_pairs(vectors, &weights, coord);
            median_of_sorted(&pairs)
        })
        .collect();

    result.map(Array1::from_vec).ok_or(BastionError::EmptyUpdates)
}

/// Weighted median of `(value, weight)` pairs sorted by value.
///
/// The half-way mark is taken from the pairs' own total, summed in the same
/// order as the running cumulative, so the last pair always reaches it.
/// Returns `None` only for an empty slice.
fn median_of_sorted(pairs: &[(f64, f64)]) -> Option<f64> {
    let half = pairs.iter().map(|&(_, w)| w).sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (i, &(value, weight)) in pairs.iter().enumerate() {
        cumulative += weight;
        if cumulative >= half - HALF_EPSILON {
            if (cumulative - half).abs() <= HALF_EPSILON {
                if let Some(&(next, _)) = pairs[i + 1..].iter().find(|(_, w)| *w > 0.0) {
                    return Some((value + next) / 2.0);
                }
            }
            return Some(value);
        }
    }
    None
}
