//! Multi-Krum selection (Blanchard et al., 2017; El Mhamdi et al., 2018).
//!
//! Each candidate is scored by the sum of its distances to its `n - f - 2`
//! nearest neighbours. Honest updates sit in a dense cluster and score low;
//! outliers score high. The `max(n - 2f, 1)` lowest-scoring candidates are
//! kept for aggregation.
//!
//! Reference: "Machine Learning with Adversaries: Byzantine Tolerant Gradient Descent"

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::pairwise_distances;
use crate::error::BastionError;

/// Minimum number of candidates Multi-Krum needs.
pub const MIN_CANDIDATES: usize = 2;

/// Result of a Multi-Krum selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Kept candidate indices, best score first
    pub indices: Vec<usize>,
    /// Krum score per candidate, in input order (all zero when degenerate)
    pub scores: Vec<f64>,
    /// Neighbours summed per score (`n - f - 2`, or 0 when degenerate)
    pub neighbors: usize,
    /// `n - f - 2 <= 0`: no filtering was possible and every index was kept
    pub degenerate: bool,
}

impl Selection {
    /// Number of kept candidates.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing was kept.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether candidate `index` was kept.
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Candidates that were filtered out, in ascending index order.
    pub fn rejected(&self) -> Vec<usize> {
        (0..self.scores.len()).filter(|i| !self.contains(*i)).collect()
    }
}

/// Select a Byzantine-resistant subset of `vectors`.
///
/// `ids` supplies the tie-break key for each vector: candidates with exactly
/// equal scores are ordered by ascending id, then by index.
///
/// # Arguments
/// * `vectors` - Candidate update vectors, all of one dimension
/// * `ids` - Tie-break key per vector (participant ids)
/// * `f` - Assumed number of Byzantine participants
///
/// # Errors
/// * [`BastionError::InsufficientUpdates`] if fewer than two candidates
/// * [`BastionError::LengthMismatch`] if `ids` and `vectors` differ in length
/// * [`BastionError::DimensionMismatch`] if the vectors disagree on dimension
pub fn select<K: Ord + Sync>(
    vectors: &[ArrayView1<'_, f64>],
    ids: &[K],
    f: usize,
) -> Result<Selection, BastionError> {
    let n = vectors.len();
    if n < MIN_CANDIDATES {
        return Err(BastionError::InsufficientUpdates {
            needed: MIN_CANDIDATES,
            actual: n,
        });
    }
    if ids.len() != n {
        return Err(BastionError::LengthMismatch {
            what: "ids",
            expected: n,
            actual: ids.len(),
        });
    }

    let distances = pairwise_distances(vectors)?;

    // k = n - f - 2 must be positive for the score to mean anything.
    if n <= f + 2 {
        tracing::warn!(n, f, "Multi-Krum degenerate (n - f - 2 <= 0), keeping all candidates");
        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| ids[a].cmp(&ids[b]).then(a.cmp(&b)));
        return Ok(Selection {
            indices,
            scores: vec![0.0; n],
            neighbors: 0,
            degenerate: true,
        });
    }
    let k = n - f - 2;

    let scores: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut row: Vec<f64> = distances
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &d)| d)
                .collect();
            row.sort_by(|a, b| a.total_cmp(b));
            row.iter().take(k).sum()
        })
        .collect();

    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|&a, &b| {
        scores[a]
            .total_cmp(&scores[b])
            .then_with(|| ids[a].cmp(&ids[b]))
            .then(a.cmp(&b))
    });

    let keep = n.saturating_sub(2 * f).max(1);
    ranked.truncate(keep);

    Ok(Selection {
        indices: ranked,
        scores,
        neighbors: k,
        degenerate: false,
    })
}
