pub mod feedback;

pub use feedback::{FeedbackRecord, FEEDBACK_NAMESPACE};
