//! Per-round participant updates.

use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Stable participant identifier.
///
/// Ordered lexicographically; that order is the deterministic tie-break used
/// by Multi-Krum selection.
pub type ParticipantId = String;

/// Default reputation multiplier for a participant.
pub const DEFAULT_CONTRIBUTION_SCORE: f64 = 1.0;

/// One participant's contribution for one round.
///
/// Built by the local trainer side and consumed as opaque numbers. Use
/// [`Update::new`] plus the `with_*` setters:
///
/// ```rust
/// use bastion_fl::Update;
/// use ndarray::array;
///
/// let update = Update::new("node-7", 3, array![0.1, -0.2, 0.05])
///     .with_stake(1200.0)
///     .with_tag(b"opaque-tag".to_vec());
/// assert_eq!(update.dimension(), 3);
/// assert_eq!(update.contribution_score, 1.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Submitting participant
    pub participant_id: ParticipantId,
    /// Round this update belongs to (1-based)
    pub round_number: u64,
    /// Weight delta, fixed dimension per round
    pub vector: Array1<f64>,
    /// Economic weight reported with the update
    pub stake: f64,
    /// Reputation multiplier (>= 0)
    pub contribution_score: f64,
    /// Creation time; not required to be monotonic
    pub timestamp: DateTime<Utc>,
    /// Opaque tag bound to `(participant_id, round_number)`
    pub authentication_tag: Vec<u8>,
    /// Cumulative privacy budget reported by the participant's accountant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_spent: Option<f64>,
}

impl Update {
    /// Create an update with zero stake, the default contribution score,
    /// an empty tag and the current time.
    pub fn new(participant_id: impl Into<ParticipantId>, round_number: u64, vector: Array1<f64>) -> Self {
        Self {
            participant_id: participant_id.into(),
            round_number,
            vector,
            stake: 0.0,
            contribution_score: DEFAULT_CONTRIBUTION_SCORE,
            timestamp: Utc::now(),
            authentication_tag: Vec::new(),
            privacy_spent: None,
        }
    }

    /// Set the reported stake.
    pub fn with_stake(mut self, stake: f64) -> Self {
        self.stake = stake;
        self
    }

    /// Set the contribution score.
    pub fn with_contribution_score(mut self, score: f64) -> Self {
        self.contribution_score = score;
        self
    }

    /// Attach the authentication tag.
    pub fn with_tag(mut self, tag: Vec<u8>) -> Self {
        self.authentication_tag = tag;
        self
    }

    /// Attach a privacy-budget report.
    pub fn with_privacy_spent(mut self, spent: f64) -> Self {
        self.privacy_spent = Some(spent);
        self
    }

    /// Override the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Length of the update vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Borrow the update vector.
    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.vector.view()
    }

    /// Aggregation weight: `stake × contribution_score`, saturating at `f64::MAX`.
    pub fn weight(&self) -> f64 {
        let weight = self.stake * self.contribution_score;
        if weight == f64::INFINITY {
            f64::MAX
        } else {
            weight
        }
    }
}
