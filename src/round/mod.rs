//! Round orchestration.
//!
//! [`RoundOrchestrator`] drives one round at a time through
//!
//! ```text
//! Collecting -> Validating -> Selecting -> Aggregating -> Applying -> Rewarding -> Closed
//! ```
//!
//! with `Aborted` reachable from every stage before the consensus has been
//! applied. An aborted round leaves the ledger untouched.
//!
//! Validation runs the stateless checks in parallel, then merges verdicts in
//! arrival order so the first accepted update per participant wins and later
//! ones are rejected as duplicates.

pub mod collaborators;
pub mod collector;
pub mod state;
pub mod summary;

pub use collaborators::{CancellationFlag, InMemoryModel, ModelStateHolder, RoundObserver, TracingObserver};
pub use collector::{Inbox, UpdateSender};
pub use state::{Rejection, RoundPhase, RoundState};
pub use summary::{AuditLog, RoundSummary};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use rayon::prelude::*;

use crate::aggregators::MIN_AGGREGATION_INPUTS;
use crate::auth::Authenticator;
use crate::config::{CollectionPolicy, RoundConfig, StakeSource};
use crate::error::{AbortReason, BastionError, RejectReason};
use crate::ledger::StakeLedger;
use crate::selection::{byzantine_fraction_within, krum_condition_met, select_updates};
use crate::update::{ParticipantId, Update};
use crate::validation::{UpdateValidator, Verdict};

/// Final state and summary of one round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// Round state at its terminal phase
    pub state: RoundState,
    /// Metrics handed to observers and the audit log
    pub summary: RoundSummary,
}

impl RoundReport {
    /// Consensus vector, if the round closed.
    pub fn consensus(&self) -> Option<&Array1<f64>> {
        match self.state.phase() {
            RoundPhase::Closed => self.state.aggregated_vector.as_ref(),
            _ => None,
        }
    }

    /// Abort reason, if the round aborted.
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.state.abort_reason.as_ref()
    }
}

/// Bookkeeping gathered while a round runs.
#[derive(Default)]
struct RoundRun {
    /// Senders whose authentication tag verified
    authenticated: BTreeSet<ParticipantId>,
    /// Accepted senders over the privacy budget ceiling
    over_budget: Vec<ParticipantId>,
}

/// Sequential round driver.
///
/// Owns the validator, the model-state holder and the audit log; shares the
/// stake ledger. Rounds take `&mut self`, so only one is ever live.
pub struct RoundOrchestrator {
    config: RoundConfig,
    ledger: Arc<StakeLedger>,
    validator: UpdateValidator,
    model: Box<dyn ModelStateHolder>,
    observers: Vec<Arc<dyn RoundObserver>>,
    audit: AuditLog,
    cancellation: CancellationFlag,
    next_round: u64,
    excluded: BTreeSet<ParticipantId>,
}

impl RoundOrchestrator {
    /// Create an orchestrator starting at round 1.
    ///
    /// # Errors
    /// [`BastionError::InvalidConfig`] or [`BastionError::InvalidTrimFraction`]
    /// if `config` does not validate.
    pub fn new(
        config: RoundConfig,
        ledger: Arc<StakeLedger>,
        authenticator: Arc<dyn Authenticator>,
        model: Box<dyn ModelStateHolder>,
    ) -> Result<Self, BastionError> {
        config.validate()?;
        if ledger.initial_stake() != config.initial_stake {
            tracing::warn!(
                ledger = ledger.initial_stake(),
                config = config.initial_stake,
                "ledger initial stake differs from configuration, ledger value wins"
            );
        }
        let validator = UpdateValidator::new(authenticator).with_max_norm(config.max_update_norm);
        Ok(Self {
            config,
            ledger,
            validator,
            model,
            observers: Vec::new(),
            audit: AuditLog::new(),
            cancellation: CancellationFlag::new(),
            next_round: 1,
            excluded: BTreeSet::new(),
        })
    }

    /// Create an orchestrator with an empty ledger at the configured initial stake.
    pub fn with_new_ledger(
        config: RoundConfig,
        authenticator: Arc<dyn Authenticator>,
        model: Box<dyn ModelStateHolder>,
    ) -> Result<Self, BastionError> {
        let ledger = Arc::new(StakeLedger::new(config.initial_stake));
        Self::new(config, ledger, authenticator, model)
    }

    /// Register an observer for round summaries.
    pub fn with_observer(mut self, observer: Arc<dyn RoundObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Resume numbering at `round_number`.
    pub fn starting_at(mut self, round_number: u64) -> Self {
        self.next_round = round_number.max(1);
        self
    }

    /// Round number the next call to [`run_round`](Self::run_round) will use.
    pub fn current_round(&self) -> u64 {
        self.next_round
    }

    /// Active configuration.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Shared stake ledger.
    pub fn ledger(&self) -> &Arc<StakeLedger> {
        &self.ledger
    }

    /// Summaries of every finished round.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Handle to the cancellation flag.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Participants whose updates the next round drops for privacy budget.
    pub fn excluded(&self) -> &BTreeSet<ParticipantId> {
        &self.excluded
    }

    /// Collect from `inbox` under `policy`, then run the round.
    pub fn collect_and_run(&mut self, inbox: &Inbox, policy: &CollectionPolicy) -> RoundReport {
        let collected = inbox.collect(policy);
        self.run_round(collected)
    }

    /// Run one complete round over the collected updates.
    ///
    /// Never fails: every problem ends the round in `Aborted` with a reason,
    /// and the round number advances either way.
    pub fn run_round(&mut self, collected: Vec<Update>) -> RoundReport {
        let started = Instant::now();
        let started_at = Utc::now();
        let round = self.next_round;
        self.next_round += 1;

        let collected_count = collected.len();
        let excluded = std::mem::take(&mut self.excluded);
        let mut state = RoundState::new(round);
        let mut run = RoundRun::default();

        tracing::debug!(round, collected = collected_count, "round started");
        if let Err(reason) = self.drive(&mut state, collected, &excluded, &mut run) {
            state.abort(reason);
        }

        if self.config.exclude_over_budget {
            self.excluded = run.over_budget.iter().cloned().collect();
        }
        self.finish(state, run, collected_count, started, started_at)
    }

    fn drive(
        &mut self,
        state: &mut RoundState,
        collected: Vec<Update>,
        excluded: &BTreeSet<ParticipantId>,
        run: &mut RoundRun,
    ) -> Result<(), AbortReason> {
        let candidates = Self::drop_excluded(state, collected, excluded);

        self.checkpoint()?;
        state.advance();
        self.validate_all(state, candidates, run);

        let needed = self.config.min_updates.max(MIN_AGGREGATION_INPUTS);
        if state.received.len() < needed {
            return Err(AbortReason::InsufficientUpdates {
                needed,
                actual: state.received.len(),
            });
        }

        self.checkpoint()?;
        state.advance();
        self.select(state)?;

        self.checkpoint()?;
        state.advance();
        let consensus = self
            .config
            .aggregation
            .try_aggregate(&state.selected_updates())
            .map_err(|e| AbortReason::AggregationFailed { reason: e.to_string() })?;

        self.checkpoint()?;
        state.advance();
        self.model
            .apply(state.round_number, &consensus)
            .map_err(|reason| AbortReason::ApplyFailed { reason })?;
        state.aggregated_vector = Some(consensus);

        state.advance();
        self.settle(state, run);

        state.advance();
        Ok(())
    }

    fn checkpoint(&self) -> Result<(), AbortReason> {
        if self.cancellation.is_cancelled() {
            Err(AbortReason::Cancelled)
        } else {
            Ok(())
        }
    }

    fn drop_excluded(
        state: &mut RoundState,
        collected: Vec<Update>,
        excluded: &BTreeSet<ParticipantId>,
    ) -> Vec<Update> {
        if excluded.is_empty() {
            return collected;
        }
        let (dropped, kept): (Vec<Update>, Vec<Update>) = collected
            .into_iter()
            .partition(|u| excluded.contains(&u.participant_id));
        for update in dropped {
            tracing::warn!(
                round = state.round_number,
                participant = %update.participant_id,
                "update dropped, privacy budget exceeded last round"
            );
            state.rejections.push(Rejection {
                participant_id: update.participant_id,
                reason: RejectReason::PrivacyBudgetExceeded,
            });
        }
        kept
    }

    fn validate_all(&self, state: &mut RoundState, candidates: Vec<Update>, run: &mut RoundRun) {
        let round = state.round_number;
        let dimension = self.config.dimension;
        let validator = &self.validator;
        let verdicts: Vec<Verdict> = candidates
            .par_iter()
            .map(|u| validator.check(u, round, dimension))
            .collect();

        let mut accepted: BTreeSet<ParticipantId> = BTreeSet::new();
        for (mut update, verdict) in candidates.into_iter().zip(verdicts) {
            let verdict = match verdict {
                Verdict::Accepted => UpdateValidator::check_duplicate(&update, &accepted).into(),
                rejected => rejected,
            };

            match verdict {
                Verdict::Accepted => {
                    run.authenticated.insert(update.participant_id.clone());
                    if self.over_budget(&update) {
                        run.over_budget.push(update.participant_id.clone());
                    }
                    if self.config.stake_source == StakeSource::Ledger {
                        self.stamp_weights(&mut update);
                    }
                    accepted.insert(update.participant_id.clone());
                    state.received.push(update);
                }
                Verdict::Rejected(reason) => {
                    if !matches!(reason, RejectReason::AuthenticationFailed) {
                        run.authenticated.insert(update.participant_id.clone());
                    }
                    tracing::warn!(round, participant = %update.participant_id, %reason, "update rejected");
                    state.rejections.push(Rejection {
                        participant_id: update.participant_id,
                        reason,
                    });
                }
            }
        }
        tracing::debug!(
            round,
            accepted = state.received.len(),
            rejected = state.rejections.len(),
            "validation complete"
        );
    }

    fn over_budget(&self, update: &Update) -> bool {
        match (self.config.privacy_budget_ceiling, update.privacy_spent) {
            (Some(ceiling), Some(spent)) => spent > ceiling,
            _ => false,
        }
    }

    fn stamp_weights(&self, update: &mut Update) {
        match self.ledger.record(&update.participant_id) {
            Some(record) => {
                update.stake = record.stake;
                update.contribution_score = record.contribution_score;
            }
            None => {
                update.stake = self.ledger.initial_stake();
                update.contribution_score = crate::update::DEFAULT_CONTRIBUTION_SCORE;
            }
        }
    }

    fn select(&self, state: &mut RoundState) -> Result<(), AbortReason> {
        let n = state.received.len();
        let f = self.config.assumed_byzantine;
        if !byzantine_fraction_within(n, f, self.config.byzantine_fraction_ceiling) {
            tracing::warn!(
                round = state.round_number,
                n,
                f,
                ceiling = self.config.byzantine_fraction_ceiling,
                "assumed Byzantine fraction at or above ceiling"
            );
        }
        if !krum_condition_met(n, f) {
            tracing::warn!(
                round = state.round_number,
                n,
                f,
                "Multi-Krum safety condition n > 2f + 2 not met"
            );
        }

        let refs: Vec<&Update> = state.received.iter().collect();
        let selection = select_updates(&refs, f).map_err(|e| match e {
            BastionError::InsufficientUpdates { needed, actual } => {
                AbortReason::InsufficientUpdates { needed, actual }
            }
            other => AbortReason::AggregationFailed {
                reason: other.to_string(),
            },
        })?;

        state.selected = selection.indices;
        state.scores = selection.scores;
        state.selection_degenerate = selection.degenerate;
        tracing::debug!(
            round = state.round_number,
            selected = state.selected.len(),
            degenerate = state.selection_degenerate,
            "selection complete"
        );
        Ok(())
    }

    fn settle(&self, state: &RoundState, run: &RoundRun) {
        for id in &run.authenticated {
            self.ledger.register(id);
        }

        let round = state.round_number;
        let selected: BTreeSet<ParticipantId> = state.selected_ids().into_iter().collect();
        let (reward, penalty) = (self.config.reward, self.config.penalty);
        let ledger = &self.ledger;
        ledger.participants().par_iter().for_each(|id| {
            if selected.contains(id) {
                ledger.reward(id, reward);
                ledger.mark_participated(id, round);
            } else {
                ledger.penalize(id, penalty);
            }
        });
    }

    fn known_participants(&self, run: &RoundRun) -> usize {
        let unregistered = run
            .authenticated
            .iter()
            .filter(|id| !self.ledger.contains(id))
            .count();
        self.ledger.len() + unregistered
    }

    fn finish(
        &mut self,
        mut state: RoundState,
        run: RoundRun,
        collected: usize,
        started: Instant,
        started_at: DateTime<Utc>,
    ) -> RoundReport {
        let known = self.known_participants(&run);
        state.participation_rate = if known == 0 {
            0.0
        } else {
            state.received.len() as f64 / known as f64
        };
        if !state.scores.is_empty() {
            state.byzantine_suspect_count = state.received.len().saturating_sub(state.selected.len());
        }

        let summary = RoundSummary {
            round_number: state.round_number,
            phase: state.phase(),
            abort_reason: state.abort_reason.clone(),
            collected,
            accepted: state.received.len(),
            rejections: state.rejections.clone(),
            selected: state.selected_ids(),
            byzantine_suspect_count: state.byzantine_suspect_count,
            participation_rate: state.participation_rate,
            selection_degenerate: state.selection_degenerate,
            policy: self.config.aggregation.name().to_string(),
            over_budget: run.over_budget,
            total_stake: self.ledger.total_stake(),
            average_stake: self.ledger.average_stake(),
            started_at,
            duration_ms: started.elapsed().as_millis().min(u64::MAX as u128) as u64,
            trail: state.trail().to_vec(),
        };

        match &summary.abort_reason {
            None => tracing::info!(
                round = summary.round_number,
                accepted = summary.accepted,
                selected = summary.selected.len(),
                suspects = summary.byzantine_suspect_count,
                "round closed"
            ),
            Some(reason) => tracing::info!(round = summary.round_number, %reason, "round aborted"),
        }

        self.audit.push(summary.clone());
        for observer in &self.observers {
            observer.on_round_finished(&summary);
        }

        RoundReport { state, summary }
    }
}

impl std::fmt::Debug for RoundOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundOrchestrator")
            .field("config", &self.config)
            .field("next_round", &self.next_round)
            .field("participants", &self.ledger.len())
            .field("rounds_logged", &self.audit.len())
            .finish_non_exhaustive()
    }
}
