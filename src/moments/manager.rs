use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use log::{info, warn};

use crate::dispatch::DispatchBus;
use crate::models::{GeoPoint, MomentOrigin, RelaxationMoment, TelemetrySample, ZenPlace};

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// `confirmed` changed (first answer or an overwrite).
    Recorded(RelaxationMoment),
    /// Same answer as before; nothing changed.
    Unchanged(RelaxationMoment),
    /// Unknown id, possibly pruned by retention.
    NotFound,
}

struct MomentSet {
    moments: Vec<RelaxationMoment>,
    next_seq: u64,
    newest_timestamp: i64,
}

/// Sole owner of the relaxation-moment set.
///
/// All mutations go through one lock, so id generation, pruning and
/// publication happen atomically with respect to each other. New moments are
/// published to the moment bus while the lock is held, which keeps delivery
/// order identical to creation order.
pub struct MomentManager {
    state: Mutex<MomentSet>,
    retention_ms: i64,
    bus: DispatchBus<RelaxationMoment>,
}

impl MomentManager {
    pub fn new(retention: Duration, bus: DispatchBus<RelaxationMoment>) -> Self {
        Self {
            state: Mutex::new(MomentSet {
                moments: Vec::new(),
                next_seq: 0,
                newest_timestamp: i64::MIN,
            }),
            retention_ms: retention.as_millis() as i64,
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MomentSet> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_from_detection(&self, sample: &TelemetrySample) -> Result<RelaxationMoment> {
        let location = sample
            .location
            .ok_or_else(|| anyhow!("sample at {} has no location", sample.timestamp))?;
        self.insert(sample, location, MomentOrigin::Detected)
    }

    /// User-declared moment. A sample without location gets `fallback()`.
    pub fn create_manual<F>(&self, sample: &TelemetrySample, fallback: F) -> Result<RelaxationMoment>
    where
        F: FnOnce() -> GeoPoint,
    {
        let location = sample.location.unwrap_or_else(fallback);
        self.insert(sample, location, MomentOrigin::Manual)
    }

    fn insert(
        &self,
        sample: &TelemetrySample,
        location: GeoPoint,
        origin: MomentOrigin,
    ) -> Result<RelaxationMoment> {
        let mut state = self.lock();

        let newest_timestamp = state.newest_timestamp.max(sample.timestamp);
        let cutoff = newest_timestamp.saturating_sub(self.retention_ms);
        if sample.timestamp < cutoff {
            bail!(
                "sample at {} is older than the retention cutoff {cutoff}",
                sample.timestamp
            );
        }

        let id = format!("{}-{}-{}", origin.tag(), sample.timestamp, state.next_seq);
        state.next_seq += 1;

        let moment = RelaxationMoment {
            id,
            timestamp: sample.timestamp,
            location,
            heart_rate: sample.heart_rate,
            stress_level: sample.stress_level,
            nearby_place: None,
            confirmed: None,
            is_manual: origin == MomentOrigin::Manual,
            notified: false,
        };

        state.moments.push(moment.clone());
        state.newest_timestamp = newest_timestamp;
        state.moments.retain(|m| m.timestamp >= cutoff);

        info!("Relaxation moment created: {} (manual={})", moment.id, moment.is_manual);
        self.bus.publish(moment.clone());
        Ok(moment)
    }

    /// Last write wins: a second, different answer overwrites the first.
    pub fn record_feedback(&self, id: &str, confirmed: bool) -> FeedbackOutcome {
        let mut state = self.lock();
        let Some(moment) = state.moments.iter_mut().find(|m| m.id == id) else {
            warn!("No relaxation moment found with id {id}");
            return FeedbackOutcome::NotFound;
        };

        if moment.confirmed == Some(confirmed) {
            return FeedbackOutcome::Unchanged(moment.clone());
        }

        moment.confirmed = Some(confirmed);
        info!(
            "User feedback for moment {id}: {}",
            if confirmed { "Relaxing" } else { "Not relaxing" }
        );
        FeedbackOutcome::Recorded(moment.clone())
    }

    /// Attach a point of interest unless one is already present.
    pub fn attach_place(&self, id: &str, place: ZenPlace) -> Option<RelaxationMoment> {
        let mut state = self.lock();
        let moment = state.moments.iter_mut().find(|m| m.id == id)?;
        if moment.nearby_place.is_none() {
            moment.nearby_place = Some(place);
        }
        Some(moment.clone())
    }

    pub fn mark_notified(&self, id: &str) -> bool {
        let mut state = self.lock();
        match state.moments.iter_mut().find(|m| m.id == id) {
            Some(moment) => {
                moment.notified = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<RelaxationMoment> {
        self.lock().moments.iter().find(|m| m.id == id).cloned()
    }

    /// Snapshot in insertion order.
    pub fn list(&self) -> Vec<RelaxationMoment> {
        self.lock().moments.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().moments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().moments.is_empty()
    }

    /// Oldest timestamp still retained, relative to the newest insertion.
    pub fn retention_cutoff(&self) -> Option<i64> {
        let state = self.lock();
        if state.moments.is_empty() {
            None
        } else {
            Some(state.newest_timestamp.saturating_sub(self.retention_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const HOUR_MS: i64 = 3_600_000;

    fn manager() -> MomentManager {
        MomentManager::new(
            Duration::from_secs(24 * 3600),
            DispatchBus::new("moments"),
        )
    }

    fn located(ts: i64) -> TelemetrySample {
        TelemetrySample::new(62, 20, 5, ts).with_location(GeoPoint::new(52.37, 4.90))
    }

    #[test]
    fn detection_requires_location() {
        let manager = manager();
        let err = manager
            .create_from_detection(&TelemetrySample::new(62, 20, 5, 0))
            .unwrap_err();
        assert!(err.to_string().contains("no location"));
        assert!(manager.is_empty());
    }

    #[test]
    fn manual_moment_gets_fallback_location() {
        let manager = manager();
        let fallback = GeoPoint::new(1.0, 2.0);
        let moment = manager.create_manual(&TelemetrySample::new(60, 10, 5, 0), || fallback).unwrap();
        assert!(moment.is_manual);
        assert_eq!(moment.location, fallback);
        assert!(moment.id.starts_with("manual-relaxation-"));
    }

    #[test]
    fn manual_moment_keeps_sample_location() {
        let manager = manager();
        let moment = manager.create_manual(&located(0), || GeoPoint::new(0.0, 0.0)).unwrap();
        assert_eq!(moment.location, GeoPoint::new(52.37, 4.90));
    }

    #[test]
    fn same_timestamp_still_yields_unique_ids() {
        let manager = manager();
        let a = manager.create_from_detection(&located(1_000)).unwrap();
        let b = manager.create_from_detection(&located(1_000)).unwrap();
        let c = manager.create_manual(&located(1_000), || GeoPoint::new(0.0, 0.0)).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert!(!a.is_manual);
    }

    #[test]
    fn concurrent_creation_never_duplicates_ids() {
        let manager = Arc::new(manager());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if worker % 2 == 0 {
                            manager.create_from_detection(&located(5_000)).unwrap();
                        } else {
                            manager.create_manual(&located(5_000), || GeoPoint::new(0.0, 0.0)).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: HashSet<String> = manager.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(manager.len(), 400);
    }

    #[test]
    fn insertion_prunes_moments_older_than_retention() {
        let manager = manager();
        manager.create_from_detection(&located(0)).unwrap();
        manager.create_from_detection(&located(10 * HOUR_MS)).unwrap();
        assert_eq!(manager.len(), 2);

        manager.create_from_detection(&located(25 * HOUR_MS)).unwrap();
        let stamps: Vec<i64> = manager.list().iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![10 * HOUR_MS, 25 * HOUR_MS]);
        assert_eq!(manager.retention_cutoff(), Some(HOUR_MS));
    }

    #[tokio::test]
    async fn moment_already_outside_retention_is_rejected() {
        let bus = DispatchBus::new("moments");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = bus.subscribe_fn(move |m: RelaxationMoment| {
            tx.send(m.id)?;
            Ok(())
        });
        let manager = MomentManager::new(Duration::from_secs(24 * 3600), bus);

        let kept = manager.create_from_detection(&located(30 * HOUR_MS)).unwrap();
        assert!(manager.create_from_detection(&located(HOUR_MS)).is_err());
        assert!(manager
            .create_manual(&located(5 * HOUR_MS), || GeoPoint::new(0.0, 0.0))
            .is_err());
        assert_eq!(manager.len(), 1);

        // Exactly at the cutoff is still retained.
        let edge = manager.create_from_detection(&located(6 * HOUR_MS)).unwrap();
        assert_eq!(manager.len(), 2);

        assert_eq!(rx.recv().await.unwrap(), kept.id);
        assert_eq!(rx.recv().await.unwrap(), edge.id);
    }

    #[test]
    fn list_returns_insertion_order() {
        let manager = manager();
        let first = manager.create_from_detection(&located(2_000)).unwrap();
        let second = manager.create_manual(&located(1_000), || GeoPoint::new(0.0, 0.0)).unwrap();
        let ids: Vec<String> = manager.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn feedback_is_idempotent_and_last_write_wins() {
        let manager = manager();
        let moment = manager.create_from_detection(&located(0)).unwrap();

        assert!(matches!(
            manager.record_feedback(&moment.id, true),
            FeedbackOutcome::Recorded(ref m) if m.confirmed == Some(true)
        ));
        let once = manager.get(&moment.id).unwrap();
        assert!(matches!(
            manager.record_feedback(&moment.id, true),
            FeedbackOutcome::Unchanged(_)
        ));
        assert_eq!(manager.get(&moment.id).unwrap(), once);

        assert!(matches!(
            manager.record_feedback(&moment.id, false),
            FeedbackOutcome::Recorded(ref m) if m.confirmed == Some(false)
        ));
    }

    #[test]
    fn feedback_for_unknown_id_is_not_found() {
        let manager = manager();
        assert_eq!(manager.record_feedback("nope", true), FeedbackOutcome::NotFound);
    }

    #[test]
    fn attach_place_keeps_first_place() {
        use crate::models::PlaceKind;

        let manager = manager();
        let moment = manager.create_from_detection(&located(0)).unwrap();
        let first = ZenPlace::new("1", "Hortus", "", PlaceKind::Garden, GeoPoint::new(0.0, 0.0));
        let second = ZenPlace::new("2", "Vondelpark", "", PlaceKind::Park, GeoPoint::new(0.0, 0.0));

        manager.attach_place(&moment.id, first.clone()).unwrap();
        let updated = manager.attach_place(&moment.id, second).unwrap();
        assert_eq!(updated.nearby_place, Some(first));
        assert!(manager.attach_place("missing", updated.nearby_place.unwrap()).is_none());
    }

    #[tokio::test]
    async fn creations_are_published_in_order() {
        let bus = DispatchBus::new("moments");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = bus.subscribe_fn(move |m: RelaxationMoment| {
            tx.send(m.id)?;
            Ok(())
        });
        let manager = MomentManager::new(Duration::from_secs(3600), bus);

        let mut expected = Vec::new();
        for ts in 0..5 {
            expected.push(manager.create_from_detection(&located(ts)).unwrap().id);
        }
        for id in expected {
            assert_eq!(rx.recv().await.unwrap(), id);
        }
    }
}
