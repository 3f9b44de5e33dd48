//! End-to-end round tests: orchestrator, ledger, collection

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ndarray::{array, Array1};
use rand::prelude::*;

use bastion_fl::round::RoundReport;
use bastion_fl::{
    AbortReason, AcceptAll, AggregationPolicy, CollectionPolicy, DigestAuthenticator, Inbox, InMemoryModel,
    LedgerSnapshot, ModelStateHolder, RejectReason, RoundConfig, RoundObserver, RoundOrchestrator, RoundPhase,
    RoundSummary, StakeLedger, StakeSource, Update,
};

/// Model holder whose applied rounds can be inspected after it is boxed.
#[derive(Clone, Default)]
struct SharedModel(Arc<Mutex<Vec<(u64, Array1<f64>)>>>);

impl ModelStateHolder for SharedModel {
    fn apply(&mut self, round_number: u64, consensus: &Array1<f64>) -> Result<(), String> {
        self.0
            .lock()
            .map_err(|e| e.to_string())?
            .push((round_number, consensus.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct Collecting(Mutex<Vec<RoundSummary>>);

impl RoundObserver for Collecting {
    fn on_round_finished(&self, summary: &RoundSummary) {
        self.0.lock().unwrap().push(summary.clone());
    }
}

fn config(dimension: usize, f: usize) -> RoundConfig {
    let mut config = RoundConfig::new(dimension);
    config.assumed_byzantine = f;
    config
}

fn scenario_updates(round: u64) -> Vec<Update> {
    let mut updates: Vec<Update> = (0..8)
        .map(|i| Update::new(format!("honest-{}", i), round, array![1.0, 1.0, 1.0]))
        .collect();
    updates.extend((0..2).map(|i| Update::new(format!("byz-{}", i), round, array![1000.0, 1000.0, 1000.0])));
    updates
}

#[test]
fn test_byzantine_round_end_to_end() {
    let model = SharedModel::default();
    let mut orch = RoundOrchestrator::with_new_ledger(config(3, 2), Arc::new(AcceptAll), Box::new(model.clone()))
        .unwrap();

    let report = orch.run_round(scenario_updates(1));

    assert_eq!(report.state.phase(), RoundPhase::Closed);
    assert_eq!(report.consensus(), Some(&array![1.0, 1.0, 1.0]));
    assert!(report.summary.selected.iter().all(|id| id.starts_with("honest")));
    assert_eq!(report.summary.selected.len(), 6);
    assert!(!report.summary.selection_degenerate);

    let applied = model.0.lock().unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, 1);

    let ledger = orch.ledger();
    assert_eq!(ledger.stake("byz-0"), Some(980.0));
    assert_eq!(ledger.stake("byz-1"), Some(980.0));
    assert_eq!(ledger.stake("honest-0"), Some(1050.0));
    assert_eq!(ledger.record("honest-0").unwrap().stake_history, vec![1000.0, 1050.0]);
}

#[test]
fn test_single_update_round_five_aborts() {
    let ledger = Arc::new(StakeLedger::default());
    ledger.register("veteran");
    let before = ledger.snapshot();

    let mut orch = RoundOrchestrator::new(
        RoundConfig::new(2),
        Arc::clone(&ledger),
        Arc::new(AcceptAll),
        Box::new(InMemoryModel::default()),
    )
    .unwrap()
    .starting_at(5);

    let report = orch.run_round(vec![Update::new("veteran", 5, array![0.1, 0.2])]);
    assert_eq!(report.summary.round_number, 5);
    assert_eq!(
        report.abort_reason(),
        Some(&AbortReason::InsufficientUpdates { needed: 2, actual: 1 })
    );
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn test_degenerate_selection_keeps_everyone() {
    let mut orch =
        RoundOrchestrator::with_new_ledger(config(2, 2), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap();
    let report = orch.run_round(vec![
        Update::new("d", 1, array![4.0, 4.0]),
        Update::new("a", 1, array![1.0, 1.0]),
        Update::new("c", 1, array![3.0, 3.0]),
        Update::new("b", 1, array![2.0, 2.0]),
    ]);

    assert_eq!(report.state.phase(), RoundPhase::Closed);
    assert!(report.summary.selection_degenerate);
    assert_eq!(report.summary.byzantine_suspect_count, 0);
    assert_eq!(report.summary.selected, vec!["a", "b", "c", "d"]);
    assert_eq!(report.consensus(), Some(&array![2.5, 2.5]));
    assert_eq!(orch.ledger().stake("d"), Some(1050.0));
}

#[test]
fn test_single_survivor_aborts_aggregation() {
    let ledger = Arc::new(StakeLedger::default());
    ledger.register("a");
    let before = ledger.snapshot();

    // n = 5, f = 2 keeps a single update, too few to aggregate
    let mut orch = RoundOrchestrator::new(
        config(2, 2),
        Arc::clone(&ledger),
        Arc::new(AcceptAll),
        Box::new(InMemoryModel::default()),
    )
    .unwrap();
    let updates = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, id)| Update::new(*id, 1, array![i as f64, 0.0]))
        .collect();
    let report = orch.run_round(updates);

    assert_eq!(report.state.phase(), RoundPhase::Aborted);
    assert_eq!(report.summary.selected.len(), 1);
    assert!(matches!(
        report.abort_reason(),
        Some(AbortReason::AggregationFailed { reason }) if reason.contains("need 2, got 1")
    ));
    assert_eq!(ledger.snapshot(), before);
}

#[test]
fn test_zero_stake_ledger_aborts_every_policy() {
    let ids = ["a", "b", "c", "d", "e"];
    let ledger = Arc::new(StakeLedger::default());
    for id in ids {
        ledger.register(id);
        ledger.penalize(id, 1e6);
    }
    let before = ledger.snapshot();
    assert_eq!(ledger.total_stake(), 0.0);

    for policy in [
        AggregationPolicy::Mean,
        AggregationPolicy::StakeWeightedMedian,
        AggregationPolicy::StakeWeightedTrimmedMean { trim_fraction: 0.1 },
    ] {
        let name = policy.name();
        let mut cfg = config(2, 1);
        cfg.aggregation = policy;
        let model = SharedModel::default();
        let mut orch =
            RoundOrchestrator::new(cfg, Arc::clone(&ledger), Arc::new(AcceptAll), Box::new(model.clone())).unwrap();
        let updates = ids.iter().map(|id| Update::new(*id, 1, array![1.0, 1.0])).collect();
        let report = orch.run_round(updates);

        assert_eq!(
            report.abort_reason(),
            Some(&AbortReason::AggregationFailed {
                reason: "Total aggregation weight is zero".to_string()
            }),
            "{}",
            name
        );
        assert!(model.0.lock().unwrap().is_empty());
        assert_eq!(ledger.snapshot(), before);
    }
}

#[test]
fn test_reported_stakes_drive_the_median() {
    let mut cfg = config(1, 0);
    cfg.stake_source = StakeSource::Reported;
    cfg.aggregation = AggregationPolicy::StakeWeightedMedian;
    let mut orch = RoundOrchestrator::with_new_ledger(cfg, Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
        .unwrap();

    let mut updates: Vec<Update> = ["a", "b", "c"]
        .iter()
        .map(|id| Update::new(*id, 1, array![1.0]).with_stake(10.0))
        .collect();
    updates.extend(["d", "e"].iter().map(|id| Update::new(*id, 1, array![2.0]).with_stake(100.0)));
    let report = orch.run_round(updates);

    // Ledger stamping would give everyone 1000 and a median of 1.0
    assert_eq!(report.consensus(), Some(&array![2.0]));
    let stakes: Vec<f64> = report.state.received.iter().map(|u| u.stake).collect();
    assert_eq!(stakes, vec![10.0, 10.0, 10.0, 100.0, 100.0]);
}

#[test]
fn test_overflowing_reported_weight_is_rejected() {
    let mut cfg = config(1, 1);
    cfg.stake_source = StakeSource::Reported;
    cfg.aggregation = AggregationPolicy::StakeWeightedMedian;
    let mut orch = RoundOrchestrator::with_new_ledger(cfg, Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
        .unwrap();

    let mut updates: Vec<Update> = (0..6)
        .map(|i| Update::new(format!("h{}", i), 1, array![1.0]).with_stake(10.0))
        .collect();
    updates.push(
        Update::new("evil", 1, array![1.2])
            .with_stake(1e300)
            .with_contribution_score(1e10),
    );
    let report = orch.run_round(updates);

    assert_eq!(report.state.phase(), RoundPhase::Closed);
    assert_eq!(report.consensus(), Some(&array![1.0]));
    assert_eq!(report.summary.rejections.len(), 1);
    assert_eq!(report.summary.rejections[0].participant_id, "evil");
    assert!(matches!(report.summary.rejections[0].reason, RejectReason::InvalidWeight { .. }));
    assert!(!orch.ledger().contains("evil"));
}

#[test]
fn test_duplicate_never_overwrites() {
    let mut orch =
        RoundOrchestrator::with_new_ledger(config(2, 0), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap();
    let report = orch.run_round(vec![
        Update::new("a", 1, array![1.0, 1.0]),
        Update::new("b", 1, array![3.0, 3.0]),
        Update::new("a", 1, array![-500.0, 500.0]),
    ]);
    assert_eq!(report.summary.accepted, 2);
    assert_eq!(report.summary.rejections[0].reason, RejectReason::Duplicate);
    assert_eq!(report.consensus(), Some(&array![2.0, 2.0]));
}

#[test]
fn test_stakes_stay_non_negative_over_many_rounds() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut cfg = config(4, 1);
    cfg.penalty = 300.0;
    cfg.aggregation = AggregationPolicy::StakeWeightedMedian;
    let mut orch =
        RoundOrchestrator::with_new_ledger(cfg, Arc::new(AcceptAll), Box::new(InMemoryModel::default())).unwrap();

    for round in 1..=15u64 {
        let mut updates: Vec<Update> = Vec::new();
        for i in 0..7 {
            if !rng.gen_bool(0.8) {
                continue;
            }
            let center = if i == 6 { 80.0 } else { 0.0 };
            updates.push(Update::new(
                format!("p{}", i),
                round,
                Array1::from_shape_fn(4, |_| center + rng.gen_range(-0.5..0.5)),
            ));
        }
        orch.run_round(updates);
    }

    let snapshot = orch.ledger().snapshot();
    for record in &snapshot.records {
        assert!(record.stake >= 0.0);
        assert!(record.stake_history.iter().all(|&s| s >= 0.0), "{:?}", record);
    }
    assert_eq!(orch.audit_log().len(), 15);
}

#[test]
fn test_authenticated_round_with_digest_tags() {
    let key = [42u8; 32];
    let signer = DigestAuthenticator::new(key);
    let mut orch = RoundOrchestrator::with_new_ledger(
        config(2, 0),
        Arc::new(DigestAuthenticator::new(key)),
        Box::new(InMemoryModel::default()),
    )
    .unwrap();

    let mut updates: Vec<Update> = ["a", "b", "c"]
        .iter()
        .map(|id| Update::new(*id, 1, array![1.0, 2.0]).with_tag(signer.tag(id, 1)))
        .collect();
    // Replayed tag from another participant
    updates.push(Update::new("d", 1, array![9.0, 9.0]).with_tag(signer.tag("a", 1)));

    let report = orch.run_round(updates);
    assert!(report.summary.succeeded());
    assert_eq!(report.summary.rejections.len(), 1);
    assert_eq!(report.summary.rejections[0].reason, RejectReason::AuthenticationFailed);
    assert!(!orch.ledger().contains("d"));
}

#[test]
fn test_observer_sees_every_round() {
    let observer = Arc::new(Collecting::default());
    let mut orch =
        RoundOrchestrator::with_new_ledger(config(3, 2), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap()
            .with_observer(observer.clone());

    orch.run_round(scenario_updates(1));
    orch.run_round(vec![Update::new("late", 1, array![1.0, 1.0, 1.0])]);

    let seen = observer.0.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].succeeded());
    assert_eq!(seen[0].participation_rate, 1.0);
    assert_eq!(seen[0].byzantine_suspect_count, 4);
    assert_eq!(seen[0].total_stake, 6.0 * 1050.0 + 4.0 * 980.0);
    assert_eq!(seen[1].phase, RoundPhase::Aborted);
    assert!(matches!(
        seen[1].rejections[0].reason,
        RejectReason::RoundMismatch { expected: 2, actual: 1 }
    ));
}

#[test]
fn test_inbox_to_orchestrator() {
    let inbox = Inbox::new();
    let senders: Vec<_> = (0..5).map(|_| inbox.sender()).collect();
    std::thread::scope(|s| {
        for (i, sender) in senders.into_iter().enumerate() {
            s.spawn(move || {
                sender.send(Update::new(format!("node-{}", i), 1, array![0.5, -0.5])).unwrap();
            });
        }
    });

    let mut orch =
        RoundOrchestrator::with_new_ledger(config(2, 1), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap();
    let policy = CollectionPolicy::with_deadline(Duration::from_millis(500)).with_quorum(5);
    let report: RoundReport = orch.collect_and_run(&inbox, &policy);

    assert_eq!(report.summary.collected, 5);
    assert_eq!(report.consensus(), Some(&array![0.5, -0.5]));
}

#[test]
fn test_ledger_snapshot_survives_restart() {
    let mut orch =
        RoundOrchestrator::with_new_ledger(config(3, 2), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap();
    orch.run_round(scenario_updates(1));

    let json = serde_json::to_string(&orch.ledger().snapshot()).unwrap();
    let snapshot: LedgerSnapshot = serde_json::from_str(&json).unwrap();
    let restored = Arc::new(StakeLedger::from_snapshot(snapshot));

    let mut resumed = RoundOrchestrator::new(
        config(3, 2),
        restored,
        Arc::new(AcceptAll),
        Box::new(InMemoryModel::default()),
    )
    .unwrap()
    .starting_at(2);
    let report = resumed.run_round(scenario_updates(2));

    assert!(report.summary.succeeded());
    assert_eq!(resumed.ledger().stake("honest-0"), Some(1100.0));
    assert_eq!(resumed.ledger().record("byz-0").unwrap().stake_history, vec![1000.0, 980.0, 960.0]);
}

#[test]
fn test_summary_audit_json() {
    let mut orch =
        RoundOrchestrator::with_new_ledger(config(3, 2), Arc::new(AcceptAll), Box::new(InMemoryModel::default()))
            .unwrap();
    orch.run_round(scenario_updates(1));
    orch.run_round(Vec::new());

    let json = orch.audit_log().to_json().unwrap();
    let restored: bastion_fl::AuditLog = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.entries(), orch.audit_log().entries());
    assert_eq!(
        restored.entries()[1].abort_reason,
        Some(AbortReason::InsufficientUpdates { needed: 2, actual: 0 })
    );
}
