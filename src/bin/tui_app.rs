use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct SummaryResponse {
    pub total_deals: i64,
    pub deals_today: i64,
    pub avg_price: Option<f64>,
    pub avg_discount: Option<f64>,
    pub top_deals: Vec<DealResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct DealResponse {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub price_numeric: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub category: Option<String>,
    pub website: String,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub scraped_at: i64,
    pub quality_score: Option<f64>,
    pub recommendation: Option<String>,
    pub quality_band: Option<String>,
    pub times_seen: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PricePointResponse {
    pub price_numeric: f64,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub last_scrape_at: Option<u64>,
    pub deals_observed_total: Option<i64>,
    pub write_queue_pending: Option<i64>,
    pub total_deals: Option<i64>,
    pub ai_enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: Option<i64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Price history for a specific deal (from GET /deals/:id/history).
#[derive(Debug, Clone, Default)]
pub struct DealHistoryState {
    pub deal_id: Option<i64>,
    pub deal_title: Option<String>,
    pub points: Vec<PricePointResponse>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub summary: SummaryResponse,
    pub deals: Vec<DealResponse>,
    pub history: DealHistoryState,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            summary: SummaryResponse::default(),
            deals: Vec::new(),
            history: DealHistoryState::default(),
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    /// Fetch price history for one deal and store it for the detail pane.
    pub async fn fetch_deal_history(&mut self, client: &reqwest::Client, deal_id: i64) {
        let url = format!("{}/deals/{}/history", self.base_url, deal_id);
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(points) = resp.json::<Vec<PricePointResponse>>().await {
                    let title = self
                        .deals
                        .iter()
                        .find(|d| d.id == deal_id)
                        .map(|d| d.title.clone());
                    self.history = DealHistoryState {
                        deal_id: Some(deal_id),
                        deal_title: title,
                        points,
                    };
                }
            }
            _ => {}
        }
    }

    /// Clear deal detail view and show the full deal list again.
    pub fn clear_deal_history(&mut self) {
        self.history = DealHistoryState::default();
    }

    pub fn showing_history(&self) -> bool {
        self.history.deal_id.is_some()
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let summary_url = format!("{}/stats/summary", self.base_url);
        let deals_url = format!("{}/deals?limit=100", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (summary_res, deals_res, health_res, latency_res) = tokio::join!(
            client.get(&summary_url).send(),
            client.get(&deals_url).send(),
            client.get(&health_url).send(),
            client.get(&latency_url).send(),
        );

        let core_ok = summary_res.is_ok() && deals_res.is_ok();
        if !core_ok {
            let err = summary_res.err().or_else(|| deals_res.err());
            if let Some(e) = err {
                self.status = ConnectionStatus::Error(format!("{e}"));
            }
            return;
        }

        let (summary, deals) = tokio::join!(
            summary_res.unwrap().json::<SummaryResponse>(),
            deals_res.unwrap().json::<Vec<DealResponse>>(),
        );

        match (summary, deals) {
            (Ok(s), Ok(d)) => {
                self.summary = s;
                self.deals = d;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
                if let Ok(l) = latency_res {
                    if let Ok(latency) = l.json::<LatencyResponse>().await {
                        self.latency = latency;
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(v: Option<f64>) -> String {
    match v {
        Some(p) => format!("${p:.2}"),
        None => "—".to_string(),
    }
}

pub fn format_discount(v: Option<f64>) -> String {
    match v {
        Some(d) => format!("-{d:.0}%"),
        None => "—".to_string(),
    }
}

pub fn format_score(v: Option<f64>) -> String {
    match v {
        Some(s) => format!("{s:.0}"),
        None => "—".to_string(),
    }
}

/// Convert a unix-seconds timestamp to HH:MM:SS string.
pub fn format_time_secs(secs: i64) -> String {
    let secs = secs.max(0) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn main() {
    // TUI app is a work in progress — entry point lives in src/bin/tui.rs
}
