use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::engine::Pipeline;

use super::location::{location_loop, LocationProvider};
use super::loop_worker::sampling_loop;

/// Owns the background tasks of one monitoring run.
pub struct MonitoringController {
    sampling: Option<JoinHandle<()>>,
    location: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitoringController {
    pub fn new() -> Self {
        Self {
            sampling: None,
            location: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.sampling.is_some()
    }

    /// Returns `false` (and does nothing) when monitoring is already active.
    pub(crate) async fn start(
        &mut self,
        pipeline: Arc<Pipeline>,
        provider: Arc<dyn LocationProvider>,
        period: Duration,
        demo_delay: Option<Duration>,
    ) -> Result<bool> {
        if self.is_active() {
            return Ok(false);
        }

        let cancel_token = CancellationToken::new();

        // Location is optional: a provider failure only means we sample on the
        // default position.
        match provider.watch().await {
            Ok(updates) => {
                let handle = tokio::spawn(location_loop(
                    updates,
                    pipeline.location_sender(),
                    cancel_token.clone(),
                ));
                self.location = Some(handle);
                info!("Location tracking started");
            }
            Err(err) => {
                warn!("Location unavailable, using default position: {err:#}");
            }
        }

        let handle = tokio::spawn(sampling_loop(
            pipeline,
            period,
            demo_delay,
            cancel_token.clone(),
        ));

        self.sampling = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(true)
    }

    /// Cancel and join both tasks. Returns `false` when nothing was running.
    pub async fn stop(&mut self) -> Result<bool> {
        let Some(token) = self.cancel_token.take() else {
            return Ok(false);
        };
        token.cancel();

        if let Some(handle) = self.sampling.take() {
            handle.await.context("sampling loop task failed to join")?;
        }
        if let Some(handle) = self.location.take() {
            handle.await.context("location task failed to join")?;
        }
        Ok(true)
    }
}

/// Dropping the controller cancels both tasks without waiting for them.
impl Drop for MonitoringController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

impl Default for MonitoringController {
    fn default() -> Self {
        Self::new()
    }
}
