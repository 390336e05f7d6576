use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::detection::DetectionConfig;
use crate::models::GeoPoint;

/// Amsterdam city centre; used whenever no real position is known.
pub const DEFAULT_LATITUDE: f64 = 52.3676;
pub const DEFAULT_LONGITUDE: f64 = 4.9041;

const DEBUG_SAMPLE_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationSettings {
    pub enabled: bool,
    /// Chance per tick of injecting a synthetic relaxation dip.
    pub dip_probability: f64,
    /// Fill the window with an hour of plausible history on construction.
    pub seed_history: bool,
    /// Emit one demo moment this long after monitoring starts, if none exist.
    pub demo_moment_delay_secs: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dip_probability: 0.05,
            seed_history: true,
            demo_moment_delay_secs: Some(30),
        }
    }
}

impl SimulationSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dip_probability: 0.0,
            seed_history: false,
            demo_moment_delay_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub sample_interval_ms: u64,
    pub sample_retention_secs: u64,
    pub moment_retention_secs: u64,
    pub detection: DetectionConfig,
    pub enrichment_timeout_ms: u64,
    pub enrichment_radius_m: f64,
    pub default_location: GeoPoint,
    /// Total width in degrees of the jitter box around `default_location`.
    pub location_jitter_deg: f64,
    pub simulation: SimulationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 30_000,
            sample_retention_secs: 60 * 60,
            moment_retention_secs: 24 * 60 * 60,
            detection: DetectionConfig::default(),
            enrichment_timeout_ms: 5_000,
            enrichment_radius_m: 2_000.0,
            default_location: GeoPoint::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
            location_jitter_deg: 0.01,
            simulation: SimulationSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn sample_retention(&self) -> Duration {
        Duration::from_secs(self.sample_retention_secs)
    }

    pub fn moment_retention(&self) -> Duration {
        Duration::from_secs(self.moment_retention_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    /// `ZEN_DEBUG=1` (or `true`) shortens the sampling period.
    pub fn apply_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var("ZEN_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug_mode {
            self.sample_interval_ms = DEBUG_SAMPLE_INTERVAL_MS;
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}
