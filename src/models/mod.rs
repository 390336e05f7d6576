pub mod moment;
pub mod place;
pub mod sample;

pub use moment::{MomentOrigin, MomentPhase, RelaxationMoment};
pub use place::{PlaceKind, ZenPlace};
pub use sample::{GeoPoint, TelemetrySample};
