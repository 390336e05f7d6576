//! Feedback data model.
//!
//! One row per state-changing answer to "was this a good moment for you?".
//! Rows are append-only and kept for later analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{GeoPoint, RelaxationMoment};

/// Storage namespace for relaxation feedback rows.
pub const FEEDBACK_NAMESPACE: &str = "relaxation_feedback";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub moment_id: String,
    /// When the moment happened (ms since epoch).
    pub timestamp: i64,
    pub location: GeoPoint,
    pub confirmed: bool,
    pub nearby_place_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn from_moment(moment: &RelaxationMoment, confirmed: bool, recorded_at: DateTime<Utc>) -> Self {
        Self {
            moment_id: moment.id.clone(),
            timestamp: moment.timestamp,
            location: moment.location,
            confirmed,
            nearby_place_name: moment.nearby_place.as_ref().map(|p| p.name.clone()),
            recorded_at,
        }
    }
}
