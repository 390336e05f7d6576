use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::models::GeoPoint;

const LOCATION_BUFFER: usize = 16;

/// Best-effort source of position updates.
///
/// An `Err` from [`LocationProvider::watch`] (permission denied, no
/// hardware) is not fatal: monitoring continues on the default position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn watch(&self) -> Result<mpsc::Receiver<GeoPoint>>;
}

/// Never produces a position.
pub struct NoLocationProvider;

#[async_trait]
impl LocationProvider for NoLocationProvider {
    async fn watch(&self) -> Result<mpsc::Receiver<GeoPoint>> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}

/// Reports a single fixed position once per watch.
pub struct FixedLocationProvider {
    location: GeoPoint,
}

impl FixedLocationProvider {
    pub fn new(location: GeoPoint) -> Self {
        Self { location }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn watch(&self) -> Result<mpsc::Receiver<GeoPoint>> {
        let (tx, rx) = mpsc::channel(1);
        tx.try_send(self.location)?;
        Ok(rx)
    }
}

/// Positions pushed by the host application; every active watcher gets them.
#[derive(Default)]
pub struct ChannelLocationProvider {
    watchers: Mutex<Vec<mpsc::Sender<GeoPoint>>>,
}

impl ChannelLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many watchers received the update.
    pub fn push(&self, location: GeoPoint) -> usize {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|tx| !tx.is_closed());
        watchers
            .iter()
            .filter(|tx| tx.try_send(location).is_ok())
            .count()
    }
}

#[async_trait]
impl LocationProvider for ChannelLocationProvider {
    async fn watch(&self) -> Result<mpsc::Receiver<GeoPoint>> {
        let (tx, rx) = mpsc::channel(LOCATION_BUFFER);
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }
}

/// Forward position updates into `last_known` until cancelled or the
/// provider closes its stream. Dropping the receiver releases the provider's
/// subscription.
pub async fn location_loop(
    mut updates: mpsc::Receiver<GeoPoint>,
    last_known: watch::Sender<Option<GeoPoint>>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(location) => {
                    last_known.send_replace(Some(location));
                }
                None => {
                    info!("location stream closed; keeping last known position");
                    break;
                }
            },
            _ = cancel_token.cancelled() => {
                info!("location tracking shutting down");
                break;
            }
        }
    }
}
