//! Capabilities the orchestrator is wired to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array1;

use super::summary::RoundSummary;

/// Receives the consensus vector of each closed round.
pub trait ModelStateHolder: Send {
    /// Apply `consensus` as the result of `round_number`.
    ///
    /// An error aborts the round; it is reported, never retried.
    fn apply(&mut self, round_number: u64, consensus: &Array1<f64>) -> Result<(), String>;
}

/// Model holder that keeps the latest consensus in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryModel {
    /// Round of the last applied consensus
    pub round_number: Option<u64>,
    /// Last applied consensus
    pub state: Option<Array1<f64>>,
}

impl ModelStateHolder for InMemoryModel {
    fn apply(&mut self, round_number: u64, consensus: &Array1<f64>) -> Result<(), String> {
        self.round_number = Some(round_number);
        self.state = Some(consensus.clone());
        Ok(())
    }
}

impl<F> ModelStateHolder for F
where
    F: FnMut(u64, &Array1<f64>) -> Result<(), String> + Send,
{
    fn apply(&mut self, round_number: u64, consensus: &Array1<f64>) -> Result<(), String> {
        self(round_number, consensus)
    }
}

/// Sink for finished round summaries.
pub trait RoundObserver: Send + Sync {
    /// Called once per round, closed or aborted.
    fn on_round_finished(&self, summary: &RoundSummary);
}

/// Observer that emits each summary as a `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl RoundObserver for TracingObserver {
    fn on_round_finished(&self, summary: &RoundSummary) {
        tracing::info!(
            round = summary.round_number,
            phase = %summary.phase,
            accepted = summary.accepted,
            selected = summary.selected.len(),
            suspects = summary.byzantine_suspect_count,
            participation = summary.participation_rate,
            duration_ms = summary.duration_ms,
            "round summary"
        );
    }
}

/// Shared cancellation switch.
///
/// Cloning shares the flag. The orchestrator checks it before each stage up to
/// applying the consensus.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// New, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
