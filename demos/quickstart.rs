//! Quickstart: one round with two Byzantine participants

use std::sync::Arc;

use ndarray::array;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bastion_fl::round::TracingObserver;
use bastion_fl::{AcceptAll, InMemoryModel, RoundConfig, RoundOrchestrator, Update};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Bastion-FL Quickstart Demo\n");

    let config = RoundConfig::from_json_str(r#"{ "dimension": 3, "assumed_byzantine": 2 }"#)?;
    let mut orchestrator = RoundOrchestrator::with_new_ledger(
        config,
        Arc::new(AcceptAll),
        Box::new(InMemoryModel::default()),
    )?
    .with_observer(Arc::new(TracingObserver));

    println!("Simulating 10 participants (8 honest, 2 Byzantine)...\n");

    let mut updates: Vec<Update> = (0..8)
        .map(|i| Update::new(format!("honest-{}", i), 1, array![1.0, 2.0, 3.0]))
        .collect();
    updates.push(Update::new("byzantine-0", 1, array![100.0, 200.0, 300.0]));
    updates.push(Update::new("byzantine-1", 1, array![-100.0, -200.0, -300.0]));

    let report = orchestrator.run_round(updates);

    println!("Round {} finished in phase {}", report.summary.round_number, report.summary.phase);
    println!("   Consensus: {:?}", report.consensus());
    println!("   Selected:  {:?}", report.summary.selected);
    println!("   Suspects:  {}", report.summary.byzantine_suspect_count);

    let ledger = orchestrator.ledger();
    for id in ledger.participants() {
        println!("   {:<12} stake {:>7.1}", id, ledger.stake(&id).unwrap_or_default());
    }
    Ok(())
}
