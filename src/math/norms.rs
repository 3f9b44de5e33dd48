//! Norm computations for update vectors.
//!
//! Used by the distance engine and the validator's norm bound.

use ndarray::ArrayView1;

/// Compute the L2 (Euclidean) norm of a vector.
pub fn l2_norm(v: ArrayView1<'_, f64>) -> f64 {
    l2_norm_sq(v).sqrt()
}

/// Compute the squared L2 norm of a vector (avoids sqrt).
pub fn l2_norm_sq(v: ArrayView1<'_, f64>) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Euclidean distance between two vectors of equal length.
///
/// Callers are expected to have checked the lengths; extra trailing
/// coordinates of the longer vector are ignored.
pub fn euclidean_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
