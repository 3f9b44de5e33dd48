//! Byzantine-resistant subset selection.
//!
//! - [`multi_krum`] - Multi-Krum ranking over the pairwise distance matrix
//! - [`condition`] - `n > 2f + 2` and Byzantine-fraction checks

pub mod condition;
pub mod multi_krum;

pub use condition::{byzantine_fraction_within, krum_condition_met, max_tolerable_f};
pub use multi_krum::{select, Selection, MIN_CANDIDATES};

use ndarray::ArrayView1;

use crate::error::BastionError;
use crate::update::Update;

/// Run Multi-Krum over updates, breaking ties by participant id.
///
/// Indices in the returned [`Selection`] refer to positions in `updates`.
pub fn select_updates(updates: &[&Update], f: usize) -> Result<Selection, BastionError> {
    let vectors: Vec<ArrayView1<'_, f64>> = updates.iter().map(|u| u.view()).collect();
    let ids: Vec<&str> = updates.iter().map(|u| u.participant_id.as_str()).collect();
    select(&vectors, &ids, f)
}
