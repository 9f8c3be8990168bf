use crate::error::{AppError, Result};

pub const SLICKDEALS_API_URL: &str = "https://slickdeals.net/api/v2/frontpage";
pub const BESTBUY_API_URL: &str = "https://api.bestbuy.com/v1";
pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Retry backoff values in milliseconds for a failed source fetch within a cycle.
pub const FETCH_BACKOFF_MS: &[u64] = &[500, 1000, 2000];

/// Channel capacity for internal message routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Deal scorer update interval (seconds).
pub const SCORER_INTERVAL_SECS: u64 = 60;

/// ML feature export interval (seconds).
pub const ML_EXPORT_INTERVAL_SECS: u64 = 3600;

/// HTTP timeout for scraper requests (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Weight of the discount component in the blended quality score.
/// The remaining weight goes to the model's probability_good.
pub const DISCOUNT_WEIGHT: f64 = 0.6;

/// Discount-only scores scale discount_percent by this factor, capped at 100.
pub const DISCOUNT_SCALE: f64 = 1.25;

/// Recommendation thresholds on the 0-100 quality score.
pub mod score_thresholds {
    pub const BUY_MIN: f64 = 70.0;
    pub const WAIT_MIN: f64 = 40.0;
    /// A predicted price drop above this probability demotes BuyNow to Wait.
    pub const DROP_DEMOTE_MIN: f64 = 60.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// sqlx connection string. DATABASE_URL wins over DB_PATH.
    pub database_url: String,
    pub api_port: u16,
    /// Directory for CSV backups; ML feature CSVs go under <output_dir>/ml_data.
    pub output_dir: String,
    /// Path to the serialized model artifact. Missing file is not an error —
    /// scoring falls back to the discount-only path.
    pub model_path: String,
    pub slickdeals_api_url: String,
    pub bestbuy_api_url: String,
    /// Best Buy Products API key. Empty disables the bestbuy source.
    pub bestbuy_api_key: String,
    /// Gemini API key. None disables the AI description endpoint.
    pub gemini_api_key: Option<String>,
    /// Seconds between scrape cycles (SCRAPE_INTERVAL_SECS).
    pub scrape_interval_secs: u64,
    /// Sources to scrape (SCRAPE_SOURCES, comma-separated). Default: both.
    pub sources: Vec<String>,
    /// Listings below this discount percentage are rejected (RADAR_MIN_DISCOUNT).
    pub min_discount_percent: f64,
    /// Cap on accepted listings per source per cycle (RADAR_MAX_PER_SOURCE).
    pub max_deals_per_source: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "deals.db".to_string());
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| format!("sqlite:{db_path}"));

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database_url,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| {
                    AppError::Config("API_PORT must be a valid port number".to_string())
                })?,
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "output".to_string()),
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/deal_model.json".to_string()),
            slickdeals_api_url: std::env::var("SLICKDEALS_API_URL")
                .unwrap_or_else(|_| SLICKDEALS_API_URL.to_string()),
            bestbuy_api_url: std::env::var("BESTBUY_API_URL")
                .unwrap_or_else(|_| BESTBUY_API_URL.to_string()),
            bestbuy_api_key: std::env::var("BESTBUY_API_KEY").unwrap_or_default(),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            scrape_interval_secs: std::env::var("SCRAPE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse::<u64>()
                .unwrap_or(3600),
            sources: std::env::var("SCRAPE_SOURCES")
                .unwrap_or_else(|_| "slickdeals,bestbuy".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            min_discount_percent: std::env::var("RADAR_MIN_DISCOUNT")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<f64>()
                .unwrap_or(0.0),
            max_deals_per_source: std::env::var("RADAR_MAX_PER_SOURCE")
                .unwrap_or_else(|_| "500".to_string())
                .parse::<usize>()
                .unwrap_or(500),
        })
    }
}
