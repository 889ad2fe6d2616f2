use serde::{Deserialize, Serialize};

use crate::model::{ActivityId, TransitionId};

/// Serde-facing transition between two activities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionModel {
    pub id: TransitionId,
    pub source: ActivityId,
    pub target: ActivityId,
    /// condition expression handed to the configured evaluator
    #[serde(default)]
    pub condition: Option<String>,
    /// taken by an exclusive gateway when no condition matches
    #[serde(default)]
    pub is_default: bool,
}
