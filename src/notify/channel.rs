use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub moment_id: String,
}

/// On-device delivery. The host is responsible for showing the notification
/// and for turning the user's yes/no into a `record_feedback` call.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Returns an identifier for the delivered notification.
    async fn deliver(&self, notification: &Notification) -> Result<String>;
}

/// Writes notifications to the log; stands in for a real push service.
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    async fn deliver(&self, notification: &Notification) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        info!(
            "[notification {id}] {}: {} (moment {})",
            notification.title, notification.body, notification.moment_id
        );
        Ok(id)
    }
}
