//! Telemetry data model.
//!
//! A `TelemetrySample` is one point-in-time biometric reading from the
//! (simulated) wearable. Samples are immutable once built; all values are
//! clamped into their valid ranges at construction.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const HEART_RATE_MIN: u32 = 50;
pub const HEART_RATE_MAX: u32 = 120;
pub const STRESS_MAX: u32 = 100;
pub const MOVEMENT_MAX: u32 = 100;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Uniform jitter of at most `spread / 2` degrees on each axis.
    pub fn jittered<R: Rng + ?Sized>(&self, rng: &mut R, spread: f64) -> Self {
        Self {
            latitude: self.latitude + (rng.gen::<f64>() - 0.5) * spread,
            longitude: self.longitude + (rng.gen::<f64>() - 0.5) * spread,
        }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// Beats per minute, 50..=120.
    pub heart_rate: u32,
    /// 0 (relaxed) to 100 (stressed).
    pub stress_level: u32,
    /// 0 (still) to 100 (very active).
    pub movement: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub location: Option<GeoPoint>,
}

impl TelemetrySample {
    pub fn new(heart_rate: u32, stress_level: u32, movement: u32, timestamp: i64) -> Self {
        Self {
            heart_rate: heart_rate.clamp(HEART_RATE_MIN, HEART_RATE_MAX),
            stress_level: stress_level.min(STRESS_MAX),
            movement: movement.min(MOVEMENT_MAX),
            timestamp,
            location: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }
}
