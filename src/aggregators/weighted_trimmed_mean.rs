//! Stake-weighted coordinate-wise trimmed mean.
//!
//! Trims `trim_fraction` of the total weight from each tail of every
//! coordinate, then averages what is left by weight. Trimming by weight
//! rather than by count keeps a low-stake swarm from pushing honest,
//! well-staked values out of the kept band.

use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;

use super::{check_dimensions, normalize_weights, sorted_pairs};
use crate::error::BastionError;

/// Coordinate-wise weighted trimmed mean.
///
/// # Arguments
///
/// * `vectors` - Update vectors (one per participant)
/// * `weights` - Non-negative weight per vector
/// * `trim_fraction` - Share of total weight cut from each end, in `[0.0, 0.5)`
pub fn weighted_trimmed_mean(
    vectors: &[ArrayView1<'_, f64>],
    weights: &[f64],
    trim_fraction: f64,
) -> Result<Array1<f64>, BastionError> {
    check_trim_fraction(trim_fraction)?;
    let dim = check_dimensions(vectors)?;
    let weights = normalize_weights(weights, vectors.len())?;

    let lo = trim_fraction;
    let hi = 1.0 - trim_fraction;

    let result: Vec<Option<f64>> = (0..dim)
        .into_par_iter()
        .map(|coord| {
            let pairs = sorted_pairs(vectors, &weights, coord);
            let mut start = 0.0;
            let mut kept = 0.0;
            let mut sum = 0.0;
            for (value, weight) in pairs {
                let end = start + weight;
                let overlap = end.min(hi) - start.max(lo);
                if overlap > 0.0 {
                    kept += overlap;
                    sum += value * overlap;
                }
                start = end;
            }
            (kept > 0.0).then(|| sum / kept)
        })
        .collect();

    result
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .map(Array1::from_vec)
        .ok_or(BastionError::ZeroTotalWeight)
}

/// Validate a trim fraction: finite and in `[0.0, 0.5)`.
pub fn check_trim_fraction(trim_fraction: f64) -> Result<(), BastionError> {
    if (0.0..0.5).contains(&trim_fraction) {
        Ok(())
    } else {
        Err(BastionError::InvalidTrimFraction(trim_fraction))
    }
}
