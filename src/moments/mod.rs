pub mod manager;

pub use manager::{FeedbackOutcome, MomentManager};
