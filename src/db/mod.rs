pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{FeedbackRecord, FEEDBACK_NAMESPACE};
