pub mod controller;
pub mod location;
pub mod loop_worker;
pub mod sampler;
pub mod window;

pub use controller::MonitoringController;
pub use location::{
    ChannelLocationProvider, FixedLocationProvider, LocationProvider, NoLocationProvider,
};
pub use sampler::TelemetrySampler;
pub use window::RollingWindow;
