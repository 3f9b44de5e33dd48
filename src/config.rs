//! Round configuration.
//!
//! Loaded once per deployment, typically from JSON. Every field has a
//! default, so a partial document only overrides what it names:
//!
//! ```rust
//! use bastion_fl::RoundConfig;
//!
//! let config = RoundConfig::from_json_str(r#"{ "dimension": 4, "assumed_byzantine": 1 }"#).unwrap();
//! assert_eq!(config.reward, 50.0);
//! assert_eq!(config.min_updates, 2);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregators::{AggregationPolicy, MIN_AGGREGATION_INPUTS};
use crate::error::BastionError;
use crate::ledger::DEFAULT_INITIAL_STAKE;

/// Default stake reward for a selected update.
pub const DEFAULT_REWARD: f64 = 50.0;

/// Default stake penalty for known participants not selected.
pub const DEFAULT_PENALTY: f64 = 20.0;

/// Default ceiling on the assumed Byzantine fraction `f / n`.
pub const DEFAULT_BYZANTINE_FRACTION_CEILING: f64 = 1.0 / 3.0;

/// Where aggregation weights come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeSource {
    /// Stake and contribution score are read from the ledger
    #[default]
    Ledger,
    /// The values reported on each update are trusted as-is
    Reported,
}

/// Per-deployment round parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Model dimension every update must match
    pub dimension: usize,
    /// Assumed number of Byzantine participants (`f`)
    pub assumed_byzantine: usize,
    /// Consensus reduction
    pub aggregation: AggregationPolicy,
    /// Accepted updates needed to proceed past validation
    pub min_updates: usize,
    /// Stake added for each selected update
    pub reward: f64,
    /// Stake removed from every other known participant
    pub penalty: f64,
    /// Stake of a participant on first contact
    pub initial_stake: f64,
    /// Source of aggregation weights
    pub stake_source: StakeSource,
    /// Optional L2 bound on update vectors
    pub max_update_norm: Option<f64>,
    /// Privacy budget above which a participant is flagged
    pub privacy_budget_ceiling: Option<f64>,
    /// Drop flagged participants' updates in the following round
    pub exclude_over_budget: bool,
    /// Upper bound (exclusive) on `assumed_byzantine / accepted`; only logged when exceeded
    pub byzantine_fraction_ceiling: f64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            dimension: 0,
            assumed_byzantine: 0,
            aggregation: AggregationPolicy::default(),
            min_updates: MIN_AGGREGATION_INPUTS,
            reward: DEFAULT_REWARD,
            penalty: DEFAULT_PENALTY,
            initial_stake: DEFAULT_INITIAL_STAKE,
            stake_source: StakeSource::default(),
            max_update_norm: None,
            privacy_budget_ceiling: None,
            exclude_over_budget: false,
            byzantine_fraction_ceiling: DEFAULT_BYZANTINE_FRACTION_CEILING,
        }
    }
}

impl RoundConfig {
    /// Config for `dimension`-sized updates with every other field defaulted.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, BastionError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BastionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), BastionError> {
        if self.dimension == 0 {
            return Err(invalid("dimension must be positive"));
        }
        if self.min_updates < MIN_AGGREGATION_INPUTS {
            return Err(invalid(format!(
                "min_updates must be at least {}, got {}",
                MIN_AGGREGATION_INPUTS, self.min_updates
            )));
        }
        for (name, value) in [
            ("reward", self.reward),
            ("penalty", self.penalty),
            ("initial_stake", self.initial_stake),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be finite and non-negative, got {}", name, value)));
            }
        }
        if let Some(bound) = self.max_update_norm {
            if !bound.is_finite() || bound <= 0.0 {
                return Err(invalid(format!("max_update_norm must be positive, got {}", bound)));
            }
        }
        if let Some(ceiling) = self.privacy_budget_ceiling {
            if ceiling.is_nan() || ceiling < 0.0 {
                return Err(invalid(format!(
                    "privacy_budget_ceiling must be non-negative, got {}",
                    ceiling
                )));
            }
        }
        if !(self.byzantine_fraction_ceiling > 0.0 && self.byzantine_fraction_ceiling <= 1.0) {
            return Err(invalid(format!(
                "byzantine_fraction_ceiling must be in (0, 1], got {}",
                self.byzantine_fraction_ceiling
            )));
        }
        self.aggregation.validate()
    }
}

fn invalid(msg: impl Into<String>) -> BastionError {
    BastionError::InvalidConfig(msg.into())
}

/// When an [`Inbox`](crate::round::Inbox) stops collecting.
///
/// Collection ends at whichever comes first: the deadline elapses, `quorum`
/// updates have arrived, or every sender has disconnected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPolicy {
    /// Collection window in milliseconds
    pub deadline_ms: u64,
    /// Stop early once this many updates arrived
    pub quorum: Option<usize>,
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            quorum: None,
        }
    }
}

impl CollectionPolicy {
    /// Policy with the given window and no quorum.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline_ms: deadline.as_millis().min(u64::MAX as u128) as u64,
            quorum: None,
        }
    }

    /// Stop as soon as `quorum` updates arrived.
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = Some(quorum);
        self
    }

    /// Collection window.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}
