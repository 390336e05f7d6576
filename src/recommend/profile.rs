use serde::{Deserialize, Serialize};

/// What the user looks for in a calm place. Numeric fields are 1-10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceProfile {
    pub nature: f64,
    pub quiet: f64,
    pub indoor: f64,
    pub outdoor: f64,
    pub social: f64,
    pub solitude: f64,
    pub activity: f64,
    pub meditation: f64,
    pub water: f64,
    pub urban: f64,

    pub parks: bool,
    pub gardens: bool,
    pub cafes: bool,
    pub libraries: bool,
    pub museums: bool,
    pub wellness: bool,
    pub viewpoints: bool,
    pub waterfront: bool,
    pub temples: bool,
    pub historic: bool,
}

impl Default for PreferenceProfile {
    fn default() -> Self {
        Self {
            nature: 5.0,
            quiet: 5.0,
            indoor: 5.0,
            outdoor: 5.0,
            social: 5.0,
            solitude: 5.0,
            activity: 5.0,
            meditation: 5.0,
            water: 5.0,
            urban: 5.0,
            parks: false,
            gardens: false,
            cafes: false,
            libraries: false,
            museums: false,
            wellness: false,
            viewpoints: false,
            waterfront: false,
            temples: false,
            historic: false,
        }
    }
}

impl PreferenceProfile {
    /// Neutral profile nudged towards meditation; used to enrich moments.
    pub fn meditation_leaning() -> Self {
        Self {
            meditation: 7.0,
            parks: true,
            temples: true,
            ..Self::default()
        }
    }
}
