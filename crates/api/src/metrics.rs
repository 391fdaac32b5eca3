use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use extract::ProviderError;

use crate::images::ImageSource;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    rejected_requests: AtomicUsize,

    // Generations
    generations_started: AtomicUsize,
    generations_completed: AtomicUsize,
    generations_failed: AtomicUsize,
    generations_timed_out: AtomicUsize,
    total_generation_time_us: AtomicU64,

    // Images
    images_from_pexels: AtomicUsize,
    images_from_cache: AtomicUsize,
    image_placeholders: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            generations_started: AtomicUsize::new(0),
            generations_completed: AtomicUsize::new(0),
            generations_failed: AtomicUsize::new(0),
            generations_timed_out: AtomicUsize::new(0),
            total_generation_time_us: AtomicU64::new(0),
            images_from_pexels: AtomicUsize::new(0),
            images_from_cache: AtomicUsize::new(0),
            image_placeholders: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, accepted: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !accepted {
            self.rejected_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_generation_started(&self) {
        self.generations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation_completed(&self, duration: Duration) {
        self.generations_completed.fetch_add(1, Ordering::Relaxed);
        self.total_generation_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Timeouts are counted apart from other provider failures
    pub fn record_generation_failed(&self, error: &ProviderError) {
        let counter = match error {
            ProviderError::Timeout(_) => &self.generations_timed_out,
            _ => &self.generations_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self, source: ImageSource) {
        let counter = match source {
            ImageSource::Pexels => &self.images_from_pexels,
            ImageSource::Cache => &self.images_from_cache,
            ImageSource::Placeholder => &self.image_placeholders,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            generations_started: self.generations_started.load(Ordering::Relaxed),
            generations_completed: self.generations_completed.load(Ordering::Relaxed),
            generations_failed: self.generations_failed.load(Ordering::Relaxed),
            generations_timed_out: self.generations_timed_out.load(Ordering::Relaxed),
            avg_generation_time_ms: self.avg_time_ms(&self.total_generation_time_us, &self.generations_completed),
            images_from_pexels: self.images_from_pexels.load(Ordering::Relaxed),
            images_from_cache: self.images_from_cache.load(Ordering::Relaxed),
            image_placeholders: self.image_placeholders.load(Ordering::Relaxed),
        }
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub rejected_requests: usize,
    pub generations_started: usize,
    pub generations_completed: usize,
    pub generations_failed: usize,
    pub generations_timed_out: usize,
    pub avg_generation_time_ms: f64,
    pub images_from_pexels: usize,
    pub images_from_cache: usize,
    pub image_placeholders: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_generation_started();
        metrics.record_generation_completed(Duration::from_millis(40));
        metrics.record_generation_failed(&ProviderError::Timeout(30));
        metrics.record_generation_failed(&ProviderError::Transport("reset".to_string()));
        metrics.record_image(ImageSource::Placeholder);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.rejected_requests, 1);
        assert_eq!(snapshot.generations_completed, 1);
        assert_eq!(snapshot.generations_timed_out, 1);
        assert_eq!(snapshot.generations_failed, 1);
        assert!((snapshot.avg_generation_time_ms - 40.0).abs() < 1e-6);
        assert_eq!(snapshot.image_placeholders, 1);
    }
}
