use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use log::{info, warn};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Duration;

use crate::db::{Database, FeedbackRecord};
use crate::detection::{is_relaxation_moment, DetectionConfig};
use crate::dispatch::{DispatchBus, Subscriber, Subscription};
use crate::models::{GeoPoint, RelaxationMoment, TelemetrySample};
use crate::moments::{FeedbackOutcome, MomentManager};
use crate::notify::{NotificationChannel, NotificationGate};
use crate::recommend::PlaceRecommender;
use crate::sensing::{LocationProvider, MonitoringController, RollingWindow, TelemetrySampler};
use crate::settings::EngineSettings;
use crate::utils::time::now_ms;

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Samples inside the detection window that are not newer than `timestamp`.
/// A wall clock that stepped backwards must not put later readings into the
/// baseline.
fn prior_window(
    window: &RollingWindow,
    config: &DetectionConfig,
    timestamp: i64,
) -> Vec<TelemetrySample> {
    let window_ms = config.window().as_millis() as i64;
    window.between(timestamp.saturating_sub(window_ms), timestamp)
}

/// Sampling state shared between the engine handle and the sampling loop.
pub(crate) struct Pipeline {
    window: Mutex<RollingWindow>,
    sampler: Mutex<TelemetrySampler>,
    detection: DetectionConfig,
    last_location: watch::Sender<Option<GeoPoint>>,
    moments: Arc<MomentManager>,
    data_bus: DispatchBus<TelemetrySample>,
}

impl Pipeline {
    pub(crate) fn new(
        settings: &EngineSettings,
        sampler: TelemetrySampler,
        moments: Arc<MomentManager>,
        data_bus: DispatchBus<TelemetrySample>,
    ) -> Self {
        let (last_location, _) = watch::channel(None);
        Self {
            window: Mutex::new(RollingWindow::new(settings.sample_retention())),
            sampler: Mutex::new(sampler),
            detection: settings.detection.clone(),
            last_location,
            moments,
            data_bus,
        }
    }

    /// Produce one sample at `timestamp`, store it, publish it and run
    /// detection against the samples that preceded it.
    pub(crate) fn tick(&self, timestamp: i64) -> TelemetrySample {
        let location = *self.last_location.borrow();

        let (sample, triggered) = {
            let mut window = relock(&self.window);
            let sample = relock(&self.sampler).next_sample(window.latest(), location, timestamp);

            let prior = prior_window(&window, &self.detection, timestamp);
            let triggered = is_relaxation_moment(&prior, &sample, &self.detection);

            window.append(sample);
            (sample, triggered)
        };

        self.data_bus.publish(sample);

        if triggered {
            if let Err(err) = self.moments.create_from_detection(&sample) {
                warn!("Failed to record detected moment: {err:#}");
            }
        }
        sample
    }

    /// Create a single moment from a clearly relaxed reading, but only while
    /// no moments exist yet.
    pub(crate) fn inject_demo_moment(&self, timestamp: i64) -> Result<Option<RelaxationMoment>> {
        if !self.moments.is_empty() {
            return Ok(None);
        }

        let sample = relock(&self.sampler).relaxed_sample(timestamp);
        relock(&self.window).append(sample);
        self.moments.create_from_detection(&sample).map(Some)
    }

    /// Sender side of the last-known position, for the location task.
    pub(crate) fn location_sender(&self) -> watch::Sender<Option<GeoPoint>> {
        self.last_location.clone()
    }

    pub(crate) fn last_location(&self) -> Option<GeoPoint> {
        *self.last_location.borrow()
    }

    pub(crate) fn seed(&self, samples: impl IntoIterator<Item = TelemetrySample>) {
        let mut window = relock(&self.window);
        for sample in samples {
            window.append(sample);
        }
    }

    pub(crate) fn recent(&self, duration: Duration) -> Vec<TelemetrySample> {
        relock(&self.window).recent(duration)
    }

    pub(crate) fn latest(&self) -> Option<TelemetrySample> {
        relock(&self.window).latest().copied()
    }

    fn manual_sample(&self, timestamp: i64) -> TelemetrySample {
        relock(&self.sampler).relaxed_sample(timestamp)
    }

    fn fallback_location(&self) -> GeoPoint {
        relock(&self.sampler).fallback_location()
    }
}

/// Handle to one monitoring engine. Cheap to clone; every clone drives the
/// same state.
#[derive(Clone)]
pub struct ZenEngine {
    settings: Arc<EngineSettings>,
    pipeline: Arc<Pipeline>,
    moments: Arc<MomentManager>,
    moment_bus: DispatchBus<RelaxationMoment>,
    data_bus: DispatchBus<TelemetrySample>,
    gate: Arc<NotificationGate>,
    location: Arc<dyn LocationProvider>,
    controller: Arc<AsyncMutex<MonitoringController>>,
    gate_subscription: Arc<Mutex<Option<Subscription>>>,
}

impl ZenEngine {
    /// Build an engine and wire the notification gate onto the moment bus.
    /// Must be called from within a Tokio runtime.
    pub async fn new(
        settings: EngineSettings,
        db: Database,
        recommender: Arc<dyn PlaceRecommender>,
        channel: Arc<dyn NotificationChannel>,
        location: Arc<dyn LocationProvider>,
    ) -> Result<Self> {
        let moment_bus = DispatchBus::new("moment");
        let data_bus = DispatchBus::new("data");
        let moments = Arc::new(MomentManager::new(
            settings.moment_retention(),
            moment_bus.clone(),
        ));

        let mut sampler = TelemetrySampler::new(&settings);
        let history = if settings.simulation.enabled && settings.simulation.seed_history {
            sampler.seed_history(now_ms())
        } else {
            Vec::new()
        };

        let pipeline = Arc::new(Pipeline::new(
            &settings,
            sampler,
            moments.clone(),
            data_bus.clone(),
        ));
        if !history.is_empty() {
            info!("Seeding {} simulated history samples", history.len());
            pipeline.seed(history);
        }

        let gate = Arc::new(NotificationGate::new(
            moments.clone(),
            recommender,
            channel,
            db,
            settings.enrichment_timeout(),
        ));
        let gate_subscription =
            moment_bus.subscribe(gate.clone() as Arc<dyn Subscriber<RelaxationMoment>>);

        match gate.feedback_history().await {
            Ok(records) => info!("Loaded {} stored feedback records", records.len()),
            Err(err) => warn!("Failed to load stored feedback: {err:#}"),
        }

        Ok(Self {
            settings: Arc::new(settings),
            pipeline,
            moments,
            moment_bus,
            data_bus,
            gate,
            location,
            controller: Arc::new(AsyncMutex::new(MonitoringController::new())),
            gate_subscription: Arc::new(Mutex::new(Some(gate_subscription))),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns `false` when monitoring was already running.
    pub async fn start_monitoring(&self) -> Result<bool> {
        let mut controller = self.controller.lock().await;
        if controller.is_active() {
            info!("Monitoring already active");
            return Ok(false);
        }

        let demo_delay = self
            .settings
            .simulation
            .demo_moment_delay_secs
            .filter(|_| self.settings.simulation.enabled && self.moments.is_empty())
            .map(Duration::from_secs);

        let started = controller
            .start(
                self.pipeline.clone(),
                self.location.clone(),
                self.settings.sample_interval(),
                demo_delay,
            )
            .await?;

        if started {
            info!(
                "Monitoring started (every {:?})",
                self.settings.sample_interval()
            );
        }
        Ok(started)
    }

    /// Returns once the sampling and location tasks have exited. `false`
    /// when monitoring was not running.
    pub async fn stop_monitoring(&self) -> Result<bool> {
        let stopped = self.controller.lock().await.stop().await?;
        if stopped {
            info!("Monitoring stopped");
        } else {
            info!("Monitoring was not active");
        }
        Ok(stopped)
    }

    pub async fn is_monitoring(&self) -> bool {
        self.controller.lock().await.is_active()
    }

    pub fn subscribe_data<F>(&self, handler: F) -> Subscription
    where
        F: Fn(TelemetrySample) -> Result<()> + Send + Sync + 'static,
    {
        self.data_bus.subscribe_fn(handler)
    }

    pub fn subscribe_moment<F>(&self, handler: F) -> Subscription
    where
        F: Fn(RelaxationMoment) -> Result<()> + Send + Sync + 'static,
    {
        self.moment_bus.subscribe_fn(handler)
    }

    pub fn subscribe_moment_with(
        &self,
        subscriber: Arc<dyn Subscriber<RelaxationMoment>>,
    ) -> Subscription {
        self.moment_bus.subscribe(subscriber)
    }

    pub async fn record_feedback(&self, moment_id: &str, confirmed: bool) -> FeedbackOutcome {
        self.gate.record_feedback(moment_id, confirmed).await
    }

    /// User-declared moment. Without a sample, a relaxed reading is taken now;
    /// a sample without location gets a jittered default position.
    /// Fails only for a sample already older than the moment retention window.
    pub fn create_manual(&self, sample: Option<TelemetrySample>) -> Result<RelaxationMoment> {
        let sample = sample.unwrap_or_else(|| self.pipeline.manual_sample(now_ms()));
        self.moments
            .create_manual(&sample, || self.pipeline.fallback_location())
    }

    pub fn list(&self) -> Vec<RelaxationMoment> {
        self.moments.list()
    }

    pub fn get(&self, moment_id: &str) -> Option<RelaxationMoment> {
        self.moments.get(moment_id)
    }

    pub fn recent_samples(&self, duration: Duration) -> Vec<TelemetrySample> {
        self.pipeline.recent(duration)
    }

    pub fn latest_sample(&self) -> Option<TelemetrySample> {
        self.pipeline.latest()
    }

    pub fn last_location(&self) -> Option<GeoPoint> {
        self.pipeline.last_location()
    }

    pub async fn feedback_history(&self) -> Result<Vec<FeedbackRecord>> {
        self.gate.feedback_history().await
    }

    pub fn notifications(&self) -> &NotificationGate {
        &self.gate
    }

    /// Stop monitoring and detach the notification gate. Moments created
    /// afterwards are no longer notified.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_monitoring().await?;
        if let Some(subscription) = relock(&self.gate_subscription).take() {
            subscription.unsubscribe();
        }
        info!("Engine shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchBus;
    use crate::settings::SimulationSettings;
    use rand::{rngs::StdRng, SeedableRng};

    const MINUTE_MS: i64 = 60_000;

    fn quiet_settings() -> EngineSettings {
        EngineSettings {
            simulation: SimulationSettings::disabled(),
            ..EngineSettings::default()
        }
    }

    fn pipeline() -> (Pipeline, Arc<MomentManager>) {
        let settings = quiet_settings();
        let moments = Arc::new(MomentManager::new(
            settings.moment_retention(),
            DispatchBus::new("moment"),
        ));
        let sampler = TelemetrySampler::with_rng(&settings, StdRng::seed_from_u64(7));
        let pipeline = Pipeline::new(&settings, sampler, moments.clone(), DispatchBus::new("data"));
        (pipeline, moments)
    }

    fn at(ts: i64, heart_rate: u32, stress: u32, movement: u32) -> TelemetrySample {
        TelemetrySample::new(heart_rate, stress, movement, ts)
            .with_location(GeoPoint::new(52.3676, 4.9041))
    }

    #[test]
    fn tick_appends_and_uses_last_known_location() {
        let (pipeline, _) = pipeline();
        let here = GeoPoint::new(48.85, 2.35);
        pipeline.location_sender().send_replace(Some(here));

        let sample = pipeline.tick(1_000);
        assert_eq!(sample.location, Some(here));
        assert_eq!(pipeline.latest(), Some(sample));
        assert_eq!(pipeline.last_location(), Some(here));
    }

    #[test]
    fn tick_without_location_falls_back_near_default() {
        let (pipeline, _) = pipeline();
        let sample = pipeline.tick(1_000);
        let location = sample.location.unwrap();
        assert!((location.latitude - 52.3676).abs() <= 0.005 + 1e-9);
        assert!((location.longitude - 4.9041).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn samples_outside_the_detection_window_are_not_baseline() {
        let (pipeline, moments) = pipeline();
        // Only the 29-minute reading is inside the window, so the stressed
        // readings from the first minutes must not count as baseline.
        pipeline.seed([
            at(0, 120, 100, 10),
            at(MINUTE_MS, 120, 100, 10),
            at(2 * MINUTE_MS, 120, 100, 10),
            at(29 * MINUTE_MS, 60, 10, 5),
        ]);
        let sample = pipeline.tick(30 * MINUTE_MS);
        assert!(sample.heart_rate <= 63);
        assert!(moments.is_empty());
    }

    #[test]
    fn baseline_ignores_readings_newer_than_the_sample() {
        let mut window = RollingWindow::new(Duration::from_secs(3_600));
        for ts in [MINUTE_MS, 2 * MINUTE_MS, 3 * MINUTE_MS, 10 * MINUTE_MS] {
            window.append(at(ts, 75, 50, 20));
        }
        let config = DetectionConfig::default();

        let prior = prior_window(&window, &config, 4 * MINUTE_MS);
        let stamps: Vec<i64> = prior.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![MINUTE_MS, 2 * MINUTE_MS, 3 * MINUTE_MS]);

        // Two earlier readings plus a later one must not form a baseline.
        let prior = prior_window(&window, &config, 2 * MINUTE_MS + 30_000);
        assert_eq!(prior.len(), 2);
        assert!(!is_relaxation_moment(
            &prior,
            &at(2 * MINUTE_MS + 30_000, 60, 20, 5),
            &config
        ));
    }

    #[test]
    fn demo_moment_only_when_no_moments_exist() {
        let (pipeline, moments) = pipeline();
        let demo = pipeline.inject_demo_moment(5_000).unwrap().unwrap();
        assert!(!demo.is_manual);
        assert_eq!(demo.heart_rate, 60);
        assert_eq!(demo.stress_level, 10);
        assert_eq!(moments.len(), 1);

        assert!(pipeline.inject_demo_moment(6_000).unwrap().is_none());
        assert_eq!(moments.len(), 1);
    }
}
