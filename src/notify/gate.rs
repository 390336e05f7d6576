//! Notification gate.
//!
//! At most one notification per moment id per process. The id is claimed
//! before any work starts, so a failed enrichment or delivery is never
//! retried. The claimed-id set only forgets ids whose moments have already
//! left the retention window, and such moments are refused outright. The set
//! starts empty on every process start.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};

use crate::db::{Database, FeedbackRecord};
use crate::dispatch::Subscriber;
use crate::models::RelaxationMoment;
use crate::moments::{FeedbackOutcome, MomentManager};
use crate::recommend::{PlaceRecommender, PreferenceProfile};

use super::channel::{Notification, NotificationChannel};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const NOTIFICATION_TITLE: &str = "Zen Moment Detected";

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Delivered {
        notification_id: String,
        notification: Notification,
    },
    AlreadyNotified,
    DeliveryFailed(Notification),
}

pub struct NotificationGate {
    moments: Arc<MomentManager>,
    recommender: Arc<dyn PlaceRecommender>,
    channel: Arc<dyn NotificationChannel>,
    db: Database,
    profile: PreferenceProfile,
    enrichment_timeout: Duration,
    /// moment id -> moment timestamp
    notified: Mutex<HashMap<String, i64>>,
}

impl NotificationGate {
    pub fn new(
        moments: Arc<MomentManager>,
        recommender: Arc<dyn PlaceRecommender>,
        channel: Arc<dyn NotificationChannel>,
        db: Database,
        enrichment_timeout: Duration,
    ) -> Self {
        Self {
            moments,
            recommender,
            channel,
            db,
            profile: PreferenceProfile::meditation_leaning(),
            enrichment_timeout,
            notified: Mutex::new(HashMap::new()),
        }
    }

    fn notified(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.notified.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn notify(&self, moment: RelaxationMoment) -> NotifyOutcome {
        if !self.claim(&moment) {
            log_info!("Moment already notified, skipping: {}", moment.id);
            return NotifyOutcome::AlreadyNotified;
        }

        let moment = self.enrich(moment).await;
        let notification = compose_notification(&moment);

        let outcome = match self.channel.deliver(&notification).await {
            Ok(notification_id) => {
                log_info!("Notification {notification_id} sent for moment {}", moment.id);
                NotifyOutcome::Delivered {
                    notification_id,
                    notification,
                }
            }
            Err(err) => {
                log_error!("Error sending notification for moment {}: {err:#}", moment.id);
                NotifyOutcome::DeliveryFailed(notification)
            }
        };

        self.moments.mark_notified(&moment.id);
        self.sweep();
        outcome
    }

    /// Moments behind the retention cutoff count as processed: their ids may
    /// already have been swept from the notified set.
    fn claim(&self, moment: &RelaxationMoment) -> bool {
        if let Some(cutoff) = self.moments.retention_cutoff() {
            if moment.timestamp < cutoff {
                return false;
            }
        }

        let mut notified = self.notified();
        if notified.contains_key(&moment.id) {
            return false;
        }
        notified.insert(moment.id.clone(), moment.timestamp);
        true
    }

    /// Attach the top recommendation, if any. Never fails: a slow or broken
    /// recommender leaves the moment without a place.
    async fn enrich(&self, moment: RelaxationMoment) -> RelaxationMoment {
        if moment.nearby_place.is_some() {
            return moment;
        }

        let lookup = self
            .recommender
            .recommend(&self.profile, moment.location, 1);

        match tokio::time::timeout(self.enrichment_timeout, lookup).await {
            Ok(Ok(places)) => match places.into_iter().next() {
                Some(place) => {
                    log_info!("Found nearby place for {}: {}", moment.id, place.name);
                    match self.moments.attach_place(&moment.id, place.clone()) {
                        Some(updated) => updated,
                        None => RelaxationMoment {
                            nearby_place: Some(place),
                            ..moment
                        },
                    }
                }
                None => moment,
            },
            Ok(Err(err)) => {
                log_warn!("Error finding nearby place for {}: {err:#}", moment.id);
                moment
            }
            Err(_) => {
                log_warn!(
                    "Nearby place lookup for {} timed out after {:?}",
                    moment.id,
                    self.enrichment_timeout
                );
                moment
            }
        }
    }

    /// Forget ids whose moments are older than the manager's retention window.
    fn sweep(&self) {
        if let Some(cutoff) = self.moments.retention_cutoff() {
            self.notified().retain(|_, timestamp| *timestamp >= cutoff);
        }
    }

    /// Update the moment and append a feedback row when the answer changed.
    pub async fn record_feedback(&self, moment_id: &str, confirmed: bool) -> FeedbackOutcome {
        let outcome = self.moments.record_feedback(moment_id, confirmed);

        if let FeedbackOutcome::Recorded(moment) = &outcome {
            let record = FeedbackRecord::from_moment(moment, confirmed, Utc::now());
            if let Err(err) = self.db.append_feedback(&record).await {
                log_error!("Error storing feedback for moment {moment_id}: {err:#}");
            }
        }

        outcome
    }

    pub async fn feedback_history(&self) -> Result<Vec<FeedbackRecord>> {
        self.db.load_feedback().await
    }

    pub fn was_notified(&self, moment_id: &str) -> bool {
        self.notified().contains_key(moment_id)
    }

    pub fn notified_count(&self) -> usize {
        self.notified().len()
    }
}

#[async_trait]
impl Subscriber<RelaxationMoment> for NotificationGate {
    async fn handle(&self, moment: RelaxationMoment) -> Result<()> {
        self.notify(moment).await;
        Ok(())
    }
}

pub fn compose_notification(moment: &RelaxationMoment) -> Notification {
    let time = DateTime::<Utc>::from_timestamp_millis(moment.timestamp)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());

    let body = match &moment.nearby_place {
        Some(place) => format!(
            "You seemed particularly relaxed at {time} near {}. Was this a good moment for you?",
            place.name
        ),
        None => format!("You seemed particularly relaxed at {time}. Was this a good moment for you?"),
    };

    Notification {
        title: NOTIFICATION_TITLE.to_string(),
        body,
        moment_id: moment.id.clone(),
    }
}
