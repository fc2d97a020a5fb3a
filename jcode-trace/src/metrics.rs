//! In-process telemetry counters
//!
//! Values are plain atomics so the poll thread can update them without
//! locking. Each counter has a single writer; readers get approximate but
//! monotonic values through [`Metrics::snapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Upper bounds in milliseconds; the last bucket catches everything above.
const DURATION_BUCKETS_MS: [u64; 8] = [1, 5, 10, 50, 100, 500, 1000, 5000];

#[derive(Debug, Default)]
pub struct Histogram {
    buckets: [AtomicU64; DURATION_BUCKETS_MS.len() + 1],
    count: AtomicU64,
    sum_micros: AtomicU64,
}

impl Histogram {
    pub fn observe(&self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let index = DURATION_BUCKETS_MS
            .iter()
            .position(|&bound| millis <= bound)
            .unwrap_or(DURATION_BUCKETS_MS.len());
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count(),
            sum_micros: self.sum_micros.load(Ordering::Relaxed),
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
        }
    }
}

/// Liveness marker for a loop. A beat count that stops moving means the
/// loop stalled or died.
#[derive(Debug, Default)]
pub struct Heartbeat {
    beats: AtomicU64,
    last_beat_ms: AtomicU64,
}

impl Heartbeat {
    pub fn beat(&self) {
        self.beats.fetch_add(1, Ordering::Relaxed);
        self.last_beat_ms.store(unix_millis(), Ordering::Relaxed);
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn last_beat_ms(&self) -> u64 {
        self.last_beat_ms.load(Ordering::Relaxed)
    }

    /// Time since the last beat, `None` before the first one.
    pub fn age(&self) -> Option<Duration> {
        let last = self.last_beat_ms();
        if last == 0 {
            return None;
        }
        Some(Duration::from_millis(unix_millis().saturating_sub(last)))
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct SendMetrics {
    pub success: Counter,
    pub failure: Counter,
    pub error: Counter,
    pub rejected: Counter,
    pub duration: Histogram,
}

#[derive(Debug, Default)]
pub struct Metrics {
    pub events_collected: Counter,
    pub events_lost: Counter,
    pub events_dropped: Counter,
    pub decode_errors: Counter,
    pub events_emitted: Counter,
    pub events_discarded: Counter,
    pub pipeline_errors: Counter,
    pub pipeline_duration: Histogram,
    pub send: SendMetrics,
    pub poll_heartbeat: Heartbeat,
    pub consumer_heartbeat: Heartbeat,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_collected: self.events_collected.get(),
            events_lost: self.events_lost.get(),
            events_dropped: self.events_dropped.get(),
            decode_errors: self.decode_errors.get(),
            events_emitted: self.events_emitted.get(),
            events_discarded: self.events_discarded.get(),
            pipeline_errors: self.pipeline_errors.get(),
            pipeline_duration: self.pipeline_duration.snapshot(),
            send_success: self.send.success.get(),
            send_failure: self.send.failure.get(),
            send_error: self.send.error.get(),
            send_rejected: self.send.rejected.get(),
            send_duration: self.send.duration.snapshot(),
            poll_beats: self.poll_heartbeat.beats(),
            poll_last_beat_ms: self.poll_heartbeat.last_beat_ms(),
            consumer_beats: self.consumer_heartbeat.beats(),
            consumer_last_beat_ms: self.consumer_heartbeat.last_beat_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum_micros: u64,
    pub buckets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub events_collected: u64,
    pub events_lost: u64,
    pub events_dropped: u64,
    pub decode_errors: u64,
    pub events_emitted: u64,
    pub events_discarded: u64,
    pub pipeline_errors: u64,
    pub pipeline_duration: HistogramSnapshot,
    pub send_success: u64,
    pub send_failure: u64,
    pub send_error: u64,
    pub send_rejected: u64,
    pub send_duration: HistogramSnapshot,
    pub poll_beats: u64,
    pub poll_last_beat_ms: u64,
    pub consumer_beats: u64,
    pub consumer_last_beat_ms: u64,
}
