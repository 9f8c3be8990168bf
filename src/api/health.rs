//! Shared health state for the /health endpoint.
//! Updated by ScrapeRunner and DbWriter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared health metrics. Updated by pipeline components, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last completed scrape cycle (0 = none yet).
    pub last_scrape_at: AtomicU64,
    /// Total deals observed across all cycles since startup.
    pub deals_observed_total: AtomicU64,
    /// Approximate count of deal events queued for DB write.
    pub write_queue_pending: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_last_scrape_at(&self, secs: u64) {
        self.last_scrape_at.store(secs, Ordering::Relaxed);
    }

    pub fn add_deals_observed(&self, n: u64) {
        self.deals_observed_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_write_queue_pending(&self) {
        self.write_queue_pending.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_write_queue_pending(&self) {
        // Saturating: a writer restart may decrement before the runner counts
        let _ = self.write_queue_pending.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |v| Some(v.saturating_sub(1)),
        );
    }

    pub fn last_scrape_at(&self) -> u64 {
        self.last_scrape_at.load(Ordering::Relaxed)
    }

    pub fn deals_observed_total(&self) -> u64 {
        self.deals_observed_total.load(Ordering::Relaxed)
    }

    pub fn write_queue_pending(&self) -> u64 {
        self.write_queue_pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_counter_saturates_at_zero() {
        let h = HealthState::new();
        h.inc_write_queue_pending();
        h.dec_write_queue_pending();
        h.dec_write_queue_pending();
        assert_eq!(h.write_queue_pending(), 0);
    }
}
