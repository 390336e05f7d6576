//! Simulated wearable.
//!
//! Each sample is a bounded random walk from the previous one. In simulation
//! mode a rare "relaxation dip" is injected so the detector has something to
//! react to; with simulation disabled the walk is all that remains.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{
    sample::{HEART_RATE_MAX, HEART_RATE_MIN, MOVEMENT_MAX, STRESS_MAX},
    GeoPoint, TelemetrySample,
};
use crate::settings::{EngineSettings, SimulationSettings};

const START_HEART_RATE: f64 = 70.0;
const START_STRESS: f64 = 50.0;
const START_MOVEMENT: f64 = 20.0;

// Full width of the per-tick random step.
const HEART_RATE_STEP: f64 = 6.0;
const STRESS_STEP: f64 = 10.0;
const MOVEMENT_STEP: f64 = 15.0;

const DIP_HEART_RATE: f64 = 15.0;
const DIP_STRESS: f64 = 30.0;
const DIP_MOVEMENT: f64 = 15.0;
const DIP_HEART_RATE_FLOOR: f64 = 55.0;
const DIP_STRESS_FLOOR: f64 = 5.0;

const HISTORY_SAMPLES: i64 = 60;
const HISTORY_SPACING_MS: i64 = 60_000;

pub struct TelemetrySampler {
    rng: StdRng,
    simulation: SimulationSettings,
    default_location: GeoPoint,
    jitter_deg: f64,
}

impl TelemetrySampler {
    pub fn new(settings: &EngineSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_rng(settings: &EngineSettings, rng: StdRng) -> Self {
        Self {
            rng,
            simulation: settings.simulation.clone(),
            default_location: settings.default_location,
            jitter_deg: settings.location_jitter_deg,
        }
    }

    /// Build the next sample. `location` is the last known position, if any;
    /// without one the sample gets a jittered default position.
    pub fn next_sample(
        &mut self,
        previous: Option<&TelemetrySample>,
        location: Option<GeoPoint>,
        timestamp: i64,
    ) -> TelemetrySample {
        let (mut heart_rate, mut stress, mut movement) = previous
            .map(|p| (p.heart_rate as f64, p.stress_level as f64, p.movement as f64))
            .unwrap_or((START_HEART_RATE, START_STRESS, START_MOVEMENT));

        heart_rate += self.step(HEART_RATE_STEP);
        stress += self.step(STRESS_STEP);
        movement += self.step(MOVEMENT_STEP);

        heart_rate = heart_rate.clamp(HEART_RATE_MIN as f64, HEART_RATE_MAX as f64);
        stress = stress.clamp(0.0, STRESS_MAX as f64);
        movement = movement.clamp(0.0, MOVEMENT_MAX as f64);

        if self.should_dip() {
            heart_rate = (heart_rate - DIP_HEART_RATE).max(DIP_HEART_RATE_FLOOR);
            stress = (stress - DIP_STRESS).max(DIP_STRESS_FLOOR);
            movement = (movement - DIP_MOVEMENT).max(0.0);
        }

        let location = location.unwrap_or_else(|| self.fallback_location());

        TelemetrySample::new(
            heart_rate.floor() as u32,
            stress.floor() as u32,
            movement.floor() as u32,
            timestamp,
        )
        .with_location(location)
    }

    pub fn fallback_location(&mut self) -> GeoPoint {
        self.default_location
            .jittered(&mut self.rng, self.jitter_deg)
    }

    /// A clearly relaxed reading at a jittered default position.
    pub fn relaxed_sample(&mut self, timestamp: i64) -> TelemetrySample {
        let location = self.fallback_location();
        TelemetrySample::new(60, 10, 5, timestamp).with_location(location)
    }

    /// One sample per minute over the hour before `now`, without location.
    pub fn seed_history(&mut self, now: i64) -> Vec<TelemetrySample> {
        (0..HISTORY_SAMPLES)
            .map(|i| {
                TelemetrySample::new(
                    self.rng.gen_range(60..80),
                    self.rng.gen_range(30..80),
                    self.rng.gen_range(0..30),
                    now - (HISTORY_SAMPLES - i) * HISTORY_SPACING_MS,
                )
            })
            .collect()
    }

    pub fn simulation(&self) -> &SimulationSettings {
        &self.simulation
    }

    fn step(&mut self, width: f64) -> f64 {
        (self.rng.gen::<f64>() - 0.5) * width
    }

    fn should_dip(&mut self) -> bool {
        self.simulation.enabled && self.rng.gen_bool(self.simulation.dip_probability.clamp(0.0, 1.0))
    }
}
