//! In-memory latency histogram for scrape instrumentation.
//! Records the wall time of each per-source fetch within a cycle.

use std::sync::Mutex;
use std::time::Duration;

/// Shared fetch-latency stats. ScrapeRunner records, API reads.
/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Create a new histogram. Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .expect("valid histogram bounds");
        Self { inner: Mutex::new(histogram) }
    }

    /// Record a fetch latency in milliseconds.
    pub fn record_ms(&self, ms: u64) {
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms.max(1));
        }
    }

    /// Record from a std::time::Duration.
    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        self.record_ms(ms);
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        (
            Some(h.value_at_quantile(0.5)),
            Some(h.value_at_quantile(0.95)),
            Some(h.value_at_quantile(0.99)),
        )
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.percentiles(), (None, None, None));
        assert!(stats.is_empty());
    }

    #[test]
    fn records_and_reports() {
        let stats = LatencyStats::new();
        for ms in [100, 200, 300, 400, 500] {
            stats.record_ms(ms);
        }
        let (p50, p95, p99) = stats.percentiles();
        assert!(p50.is_some());
        assert!(p95.unwrap() >= p50.unwrap());
        assert!(p99.unwrap() >= p95.unwrap());
        assert_eq!(stats.len(), 5);
    }

    #[test]
    fn sub_millisecond_durations_clamp_to_one() {
        let stats = LatencyStats::new();
        stats.record(Duration::from_micros(10));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats.percentiles().0, Some(1));
    }
}
