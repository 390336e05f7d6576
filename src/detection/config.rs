use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds for the relaxation heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    /// How far back the baseline reaches
    pub window_secs: u64,

    /// Prior samples required inside the window before anything can trigger
    pub min_prior_samples: usize,

    /// Minimum drop below the baseline mean, either one suffices
    pub heart_rate_drop: f64,
    pub stress_drop: f64,

    /// Movement must be strictly below this
    pub movement_ceiling: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_secs: 5 * 60,
            min_prior_samples: 3,
            heart_rate_drop: 5.0,
            stress_drop: 10.0,
            movement_ceiling: 25,
        }
    }
}

impl DetectionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
