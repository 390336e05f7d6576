//! Relaxation moment data model.
//!
//! A moment is either detected from telemetry or declared by the user. Only
//! the moment manager mutates moments; everyone else receives clones.

use serde::{Deserialize, Serialize};

use super::{GeoPoint, ZenPlace};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MomentOrigin {
    Detected,
    Manual,
}

impl MomentOrigin {
    /// Prefix used when generating moment ids.
    pub fn tag(&self) -> &'static str {
        match self {
            MomentOrigin::Detected => "relaxation",
            MomentOrigin::Manual => "manual-relaxation",
        }
    }
}

/// Lifecycle position of a moment, derived from its fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MomentPhase {
    Detected,
    Manual,
    Notified,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelaxationMoment {
    pub id: String,
    pub timestamp: i64,
    pub location: GeoPoint,
    pub heart_rate: u32,
    pub stress_level: u32,
    pub nearby_place: Option<ZenPlace>,
    /// User feedback: `Some(true)` relaxing, `Some(false)` not relaxing.
    pub confirmed: Option<bool>,
    pub is_manual: bool,
    #[serde(default)]
    pub notified: bool,
}

impl RelaxationMoment {
    pub fn origin(&self) -> MomentOrigin {
        if self.is_manual {
            MomentOrigin::Manual
        } else {
            MomentOrigin::Detected
        }
    }

    pub fn phase(&self) -> MomentPhase {
        match (self.confirmed, self.notified, self.is_manual) {
            (Some(true), _, _) => MomentPhase::Confirmed,
            (Some(false), _, _) => MomentPhase::Rejected,
            (None, true, _) => MomentPhase::Notified,
            (None, false, true) => MomentPhase::Manual,
            (None, false, false) => MomentPhase::Detected,
        }
    }
}
