use serde::{Deserialize, Serialize};

use super::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaceKind {
    Park,
    Meditation,
    Cafe,
    Garden,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Park => "park",
            PlaceKind::Meditation => "meditation",
            PlaceKind::Cafe => "cafe",
            PlaceKind::Garden => "garden",
        }
    }
}

/// A point of interest that can be attached to a relaxation moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZenPlace {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: PlaceKind,
    pub coordinates: GeoPoint,
}

impl ZenPlace {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: PlaceKind,
        coordinates: GeoPoint,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            kind,
            coordinates,
        }
    }
}
