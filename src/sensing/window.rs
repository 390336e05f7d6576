use std::collections::VecDeque;
use std::time::Duration;

use crate::models::TelemetrySample;

/// Time-ordered samples covering at most `retention` behind the newest one.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<TelemetrySample>,
    retention_ms: i64,
}

impl RollingWindow {
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            retention_ms: retention.as_millis() as i64,
        }
    }

    /// Insert in timestamp order (appending in the common case) and drop
    /// everything older than the retention horizon.
    pub fn append(&mut self, sample: TelemetrySample) {
        match self.samples.back() {
            Some(last) if sample.timestamp < last.timestamp => {
                let idx = self
                    .samples
                    .partition_point(|s| s.timestamp <= sample.timestamp);
                self.samples.insert(idx, sample);
            }
            _ => self.samples.push_back(sample),
        }
        self.prune();
    }

    fn prune(&mut self) {
        let Some(latest) = self.samples.back().map(|s| s.timestamp) else {
            return;
        };
        let cutoff = latest.saturating_sub(self.retention_ms);
        while self
            .samples
            .front()
            .map_or(false, |s| s.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
    }

    /// Samples no older than `duration` before the newest one, oldest first.
    /// The boundary is inclusive.
    pub fn recent(&self, duration: Duration) -> Vec<TelemetrySample> {
        let Some(latest) = self.latest() else {
            return Vec::new();
        };
        self.since(latest.timestamp.saturating_sub(duration.as_millis() as i64))
    }

    pub fn since(&self, cutoff_ms: i64) -> Vec<TelemetrySample> {
        let start = self.samples.partition_point(|s| s.timestamp < cutoff_ms);
        self.samples.range(start..).copied().collect()
    }

    /// Samples with `start_ms <= timestamp <= end_ms`, oldest first.
    pub fn between(&self, start_ms: i64, end_ms: i64) -> Vec<TelemetrySample> {
        let start = self.samples.partition_point(|s| s.timestamp < start_ms);
        let end = self.samples.partition_point(|s| s.timestamp <= end_ms);
        if start >= end {
            return Vec::new();
        }
        self.samples.range(start..end).copied().collect()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
