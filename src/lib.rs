pub mod db;
pub mod detection;
pub mod dispatch;
pub mod engine;
pub mod models;
pub mod moments;
pub mod notify;
pub mod recommend;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};

pub use db::Database;
pub use engine::ZenEngine;
pub use models::{GeoPoint, RelaxationMoment, TelemetrySample, ZenPlace};
pub use moments::FeedbackOutcome;
pub use settings::{EngineSettings, SettingsStore};

use notify::LogNotificationChannel;
use recommend::{default_catalog, CatalogRecommender};
use sensing::NoLocationProvider;

const DATA_DIR_ENV: &str = "ZEN_DATA_DIR";

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("zenmoments-data"))
}

/// Monitor with the bundled catalog and a logging notification channel until
/// Ctrl-C.
pub async fn run() -> Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let settings = settings_store.engine().apply_env_overrides();
    let database = Database::new(data_dir.join("zenmoments.sqlite3"))?;

    let recommender = Arc::new(CatalogRecommender::new(
        default_catalog(),
        settings.enrichment_radius_m,
    ));
    let engine = ZenEngine::new(
        settings,
        database,
        recommender,
        Arc::new(LogNotificationChannel),
        Arc::new(NoLocationProvider),
    )
    .await?;

    let _samples = engine.subscribe_data(|sample| {
        debug!(
            "hr={} stress={} movement={} at {}",
            sample.heart_rate, sample.stress_level, sample.movement, sample.timestamp
        );
        Ok(())
    });

    engine.start_monitoring().await?;
    info!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    engine.shutdown().await?;
    info!("{} relaxation moments this session", engine.list().len());
    Ok(())
}
