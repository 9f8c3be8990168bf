pub mod bestbuy;
pub mod slickdeals;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{Config, FETCH_BACKOFF_MS, FETCH_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::state::deal_store::ObserveOutcome;
use crate::state::DealStore;
use crate::types::{DealEvent, DealRecord, Source};

// ---------------------------------------------------------------------------
// Per-source fetch accounting
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FetchStats {
    pub api_total: usize,
    pub rejected_no_title: usize,
    pub rejected_no_link: usize,
    pub rejected_low_discount: usize,
    pub rejected_out_of_stock: usize,
    pub qualified: usize,
    /// Sample of titles rejected by the discount filter.
    pub discount_samples: Vec<String>,
}

impl FetchStats {
    pub fn merge(&mut self, other: &FetchStats) {
        self.api_total += other.api_total;
        self.rejected_no_title += other.rejected_no_title;
        self.rejected_no_link += other.rejected_no_link;
        self.rejected_low_discount += other.rejected_low_discount;
        self.rejected_out_of_stock += other.rejected_out_of_stock;
        self.qualified += other.qualified;
    }
}

pub(crate) enum Rejection {
    NoTitle,
    NoLink,
    LowDiscount(String),
    OutOfStock,
}

pub(crate) fn record_rejection(stats: &mut FetchStats, rejection: Rejection) {
    match rejection {
        Rejection::NoTitle => stats.rejected_no_title += 1,
        Rejection::NoLink => stats.rejected_no_link += 1,
        Rejection::LowDiscount(title) => {
            stats.rejected_low_discount += 1;
            if stats.discount_samples.len() < 10 {
                stats.discount_samples.push(title);
            }
        }
        Rejection::OutOfStock => stats.rejected_out_of_stock += 1,
    }
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ---------------------------------------------------------------------------
// Fetch dispatch
// ---------------------------------------------------------------------------

/// Fetch one source once, no retries.
pub async fn fetch_source(
    client: &reqwest::Client,
    cfg: &Config,
    source: Source,
) -> Result<(Vec<DealRecord>, FetchStats)> {
    match source {
        Source::Slickdeals => slickdeals::fetch_deals(client, cfg).await,
        Source::Bestbuy => bestbuy::fetch_deals(client, cfg).await,
    }
}

/// Fetch one source with bounded retry backoff. A source that fails every
/// attempt yields an empty result for this cycle; the next cycle retries.
pub async fn fetch_source_with_retry(
    client: &reqwest::Client,
    cfg: &Config,
    source: Source,
) -> (Vec<DealRecord>, FetchStats) {
    let mut attempt = 0usize;
    loop {
        match fetch_source(client, cfg, source).await {
            Ok(result) => return result,
            Err(e) => {
                if attempt >= FETCH_BACKOFF_MS.len() {
                    error!("[{source}] fetch failed after {} attempts: {e}", attempt + 1);
                    return (Vec::new(), FetchStats::default());
                }
                let backoff = FETCH_BACKOFF_MS[attempt];
                warn!("[{source}] fetch error (attempt {}): {e} — retrying in {backoff}ms", attempt + 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScrapeRunner — the background scrape loop
// ---------------------------------------------------------------------------

/// Runs one scrape cycle per interval: fetches every enabled source
/// concurrently, folds results through the DealStore, and forwards observed
/// deals to the DB writer over the event channel.
pub struct ScrapeRunner {
    cfg: Config,
    store: Arc<DealStore>,
    deal_tx: mpsc::Sender<DealEvent>,
    latency: Arc<LatencyStats>,
    health: Arc<HealthState>,
}

impl ScrapeRunner {
    pub fn new(
        cfg: Config,
        store: Arc<DealStore>,
        deal_tx: mpsc::Sender<DealEvent>,
        latency: Arc<LatencyStats>,
        health: Arc<HealthState>,
    ) -> Self {
        Self { cfg, store, deal_tx, latency, health }
    }

    pub async fn run(self) {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to build scraper HTTP client: {e}");
                return;
            }
        };

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.cfg.scrape_interval_secs));

        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle(&client).await {
                error!("Scrape cycle error: {e}");
            }
        }
    }

    pub async fn run_cycle(&self, client: &reqwest::Client) -> Result<()> {
        let cycle_started_at = now_secs();
        let sources: Vec<Source> = self
            .cfg
            .sources
            .iter()
            .filter_map(|s| Source::parse(s))
            .filter(|&s| {
                if s == Source::Bestbuy && self.cfg.bestbuy_api_key.is_empty() {
                    warn!("BESTBUY_API_KEY not set — skipping bestbuy this cycle");
                    false
                } else {
                    true
                }
            })
            .collect();

        let fetches = sources.iter().map(|&source| {
            let client = client.clone();
            let cfg = self.cfg.clone();
            async move {
                let started = Instant::now();
                let result = fetch_source_with_retry(&client, &cfg, source).await;
                (source, result, started.elapsed())
            }
        });
        let results = futures_util::future::join_all(fetches).await;

        let mut totals = FetchStats::default();
        let mut observed = 0usize;
        for (source, (deals, stats), elapsed) in results {
            self.latency.record(elapsed);
            info!(
                "[{source}] cycle fetch: {} qualified of {} API results in {:.1}s \
                 (no_title={} no_link={} low_discount={} out_of_stock={})",
                stats.qualified,
                stats.api_total,
                elapsed.as_secs_f64(),
                stats.rejected_no_title,
                stats.rejected_no_link,
                stats.rejected_low_discount,
                stats.rejected_out_of_stock,
            );
            if !stats.discount_samples.is_empty() {
                info!(
                    "[{source}] sample titles rejected by discount filter: {:?}",
                    stats.discount_samples
                );
            }
            totals.merge(&stats);

            for deal in deals {
                let outcome = self.store.observe(deal.clone());
                let price_point =
                    deal.price_numeric.is_some() && outcome != ObserveOutcome::Unchanged;
                observed += 1;
                self.health.inc_write_queue_pending();
                self.deal_tx
                    .send(DealEvent::Observed { deal, price_point })
                    .await
                    .map_err(|e| AppError::ChannelSend(e.to_string()))?;
            }
        }

        self.deal_tx
            .send(DealEvent::CycleComplete { cycle_started_at })
            .await
            .map_err(|e| AppError::ChannelSend(e.to_string()))?;

        self.health.set_last_scrape_at(cycle_started_at as u64);
        self.health.add_deals_observed(observed as u64);
        info!(
            "Scrape cycle complete: {observed} deals observed, {} tracked total ({} priced)",
            self.store.deal_count(),
            self.store.priced_deal_count()
        );
        Ok(())
    }
}
