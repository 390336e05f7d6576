pub mod config;
pub mod detector;

pub use config::DetectionConfig;
pub use detector::{is_relaxation_moment, Baseline};
