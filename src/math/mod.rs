//! Mathematical primitives for Bastion-FL.
//!
//! - [`norms`] - L2 norms and Euclidean distance over `f64` vectors

pub mod norms;

pub use norms::{euclidean_distance, l2_norm, l2_norm_sq};
