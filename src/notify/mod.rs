pub mod channel;
pub mod gate;

pub use channel::{LogNotificationChannel, Notification, NotificationChannel};
pub use gate::{compose_notification, NotificationGate, NotifyOutcome};
