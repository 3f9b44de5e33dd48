//! Pairwise distance engine.
//!
//! Computes the symmetric N×N matrix of Euclidean distances that Multi-Krum
//! ranks candidates from. Pure and deterministic: every `(i, j)` pair with
//! `i < j` is computed exactly once and mirrored, so the matrix is bit-for-bit
//! symmetric regardless of how rayon schedules the rows.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::error::BastionError;
use crate::math::euclidean_distance;

/// Compute the pairwise Euclidean distance matrix.
///
/// Returns an `N×N` matrix with a zero diagonal. An empty input yields an
/// empty `0×0` matrix.
///
/// # Errors
///
/// [`BastionError::DimensionMismatch`] if the vectors do not all share the
/// first vector's length.
pub fn pairwise_distances(vectors: &[ArrayView1<'_, f64>]) -> Result<Array2<f64>, BastionError> {
    let n = vectors.len();
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let dim = vectors[0].len();
    for v in &vectors[1..] {
        if v.len() != dim {
            return Err(BastionError::DimensionMismatch {
                expected: dim,
                actual: v.len(),
            });
        }
    }

    // Upper triangle, one row per task.
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| euclidean_distance(vectors[i], vectors[j]))
                .collect()
        })
        .collect();

    let mut matrix = Array2::<f64>::zeros((n, n));
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, d) in row.into_iter().enumerate() {
            let j = i + 1 + offset;
            matrix[[i, j]] = d;
            matrix[[j, i]] = d;
        }
    }

    Ok(matrix)
}
