//! Coordinate-wise mean of the trusted subset.
//!
//! Standard federated averaging (McMahan et al., 2017). On its own a single
//! Byzantine client can drag it anywhere, so it is meant to run after
//! Multi-Krum has already excluded outliers.

use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;

use super::check_dimensions;
use crate::error::BastionError;

/// Coordinate-wise arithmetic mean.
///
/// Each coordinate's values are summed in sorted order, so the result does
/// not depend on the order of `vectors`.
pub fn mean(vectors: &[ArrayView1<'_, f64>]) -> Result<Array1<f64>, BastionError> {
    let dim = check_dimensions(vectors)?;
    let n = vectors.len() as f64;

    let result: Vec<f64> = (0..dim)
        .into_par_iter()
        .map(|coord| {
            let mut values: Vec<f64> = vectors.iter().map(|v| v[coord]).collect();
            values.sort_by(f64::total_cmp);
            values.iter().sum::<f64>() / n
        })
        .collect();

    Ok(Array1::from_vec(result))
}
