use crate::detection::config::DetectionConfig;
use crate::models::TelemetrySample;

/// Arithmetic means over the samples preceding the one under test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub heart_rate: f64,
    pub stress_level: f64,
    pub movement: f64,
    pub sample_count: usize,
}

impl Baseline {
    pub fn from_samples(samples: &[TelemetrySample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let (hr, stress, movement) = samples.iter().fold((0.0, 0.0, 0.0), |acc, s| {
            (
                acc.0 + s.heart_rate as f64,
                acc.1 + s.stress_level as f64,
                acc.2 + s.movement as f64,
            )
        });

        Some(Self {
            heart_rate: hr / count,
            stress_level: stress / count,
            movement: movement / count,
            sample_count: samples.len(),
        })
    }
}

/// Decide whether `sample` is a relaxation moment relative to `prior`.
///
/// Triggers when heart rate or stress dropped far enough below the prior
/// mean while movement stays low. Samples without a location never trigger.
pub fn is_relaxation_moment(
    prior: &[TelemetrySample],
    sample: &TelemetrySample,
    config: &DetectionConfig,
) -> bool {
    if sample.location.is_none() {
        return false;
    }

    if prior.len() < config.min_prior_samples {
        return false;
    }

    let Some(baseline) = Baseline::from_samples(prior) else {
        return false;
    };

    let heart_rate_drop = baseline.heart_rate - sample.heart_rate as f64;
    let stress_drop = baseline.stress_level - sample.stress_level as f64;

    (heart_rate_drop >= config.heart_rate_drop || stress_drop >= config.stress_drop)
        && sample.movement < config.movement_ceiling
}
