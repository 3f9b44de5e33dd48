//! Multi-Krum safety condition checks.
//!
//! Safety requires the Byzantine fraction to stay *below* a threshold. The
//! structural requirement is `n > 2f + 2`; on top of that, deployments may
//! cap the assumed fraction `f / n` with a configurable ceiling.

/// Check whether the Multi-Krum guarantee holds: `n > 2f + 2`.
pub fn krum_condition_met(n: usize, f: usize) -> bool {
    n > 2 * f + 2
}

/// Compute the maximum number of Byzantine participants tolerable for `n`.
///
/// Returns `(n - 3) / 2` (integer division). Returns 0 if `n < 3`.
pub fn max_tolerable_f(n: usize) -> usize {
    if n < 3 {
        0
    } else {
        (n - 3) / 2
    }
}

/// Whether the assumed Byzantine fraction `f / n` is strictly below `ceiling`.
///
/// An empty round (`n == 0`) is never considered safe.
pub fn byzantine_fraction_within(n: usize, f: usize, ceiling: f64) -> bool {
    n > 0 && (f as f64 / n as f64) < ceiling
}
