//! Numeric sanity checks for update vectors.
//!
//! Rejects vectors with non-finite entries or an L2 norm above a bound,
//! keeping Byzantine clients from injecting extreme values before selection.

use ndarray::ArrayView1;

use crate::error::RejectReason;
use crate::math::norms::l2_norm;

/// Check that every coordinate is finite.
pub fn check_finite(vector: ArrayView1<'_, f64>) -> Result<(), RejectReason> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(RejectReason::NonFiniteValue { index }),
        None => Ok(()),
    }
}

/// Check that a vector's L2 norm is within `max_norm` (inclusive).
pub fn check_norm_bound(vector: ArrayView1<'_, f64>, max_norm: f64) -> Result<(), RejectReason> {
    let norm = l2_norm(vector);
    if norm <= max_norm {
        Ok(())
    } else {
        Err(RejectReason::NormExceeded {
            norm,
            bound: max_norm,
        })
    }
}
