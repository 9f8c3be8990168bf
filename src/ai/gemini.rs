//! Optional Gemini-backed deal descriptions. Constructed only when an API
//! key is configured; everything else in the system works without it.

use std::time::Duration;

use tracing::info;

use crate::config::{Config, GEMINI_API_URL};
use crate::error::{AppError, Result};
use crate::types::DealRecord;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GeminiClient {
    /// Returns None when no API key is configured — callers treat that as
    /// "feature disabled", not an error.
    pub fn from_config(cfg: &Config) -> Option<Self> {
        let api_key = cfg.gemini_api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .ok()?;
        info!("Gemini deal descriptions enabled");
        Some(Self { client, api_key, api_url: GEMINI_API_URL.to_string() })
    }

    /// Generate a short natural-language description for one deal.
    pub async fn describe_deal(&self, deal: &DealRecord) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": build_prompt(deal) }]
            }]
        });

        let url = format!("{}?key={}", self.api_url, self.api_key);
        let resp: serde_json::Value =
            self.client.post(&url).json(&body).send().await?.json().await?;

        resp.get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .and_then(|a| a.first())
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AppError::Scrape("Gemini response had no text candidate".to_string()))
    }
}

fn build_prompt(deal: &DealRecord) -> String {
    let price = deal
        .price_numeric
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "unknown".to_string());
    let original = deal
        .original_price
        .map(|p| format!("${p:.2}"))
        .unwrap_or_else(|| "unknown".to_string());
    let discount = deal
        .discount_percent
        .map(|d| format!("{d:.0}%"))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Write a concise 2-3 sentence description of this product deal for a \
         shopping dashboard. Mention whether the price looks attractive.\n\
         Product: {}\nCurrent price: {price}\nOriginal price: {original}\n\
         Discount: {discount}\nSource: {}",
        deal.title, deal.source
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    #[test]
    fn prompt_includes_deal_fields() {
        let deal = DealRecord {
            title: "Samsung 55\" OLED TV".to_string(),
            link: "https://example.com/tv".to_string(),
            price_text: Some("$899.99".to_string()),
            price_numeric: Some(899.99),
            original_price: Some(1499.99),
            discount_percent: Some(40.0),
            category: None,
            source: Source::Bestbuy,
            rating: None,
            reviews_count: None,
            in_stock: true,
            scraped_at: 0,
        };
        let prompt = build_prompt(&deal);
        assert!(prompt.contains("Samsung 55\" OLED TV"));
        assert!(prompt.contains("$899.99"));
        assert!(prompt.contains("$1499.99"));
        assert!(prompt.contains("40%"));
        assert!(prompt.contains("bestbuy"));
    }

    #[test]
    fn disabled_without_api_key() {
        let cfg = Config {
            log_level: "info".into(),
            database_url: "sqlite::memory:".into(),
            api_port: 3000,
            output_dir: "output".into(),
            model_path: "models/deal_model.json".into(),
            slickdeals_api_url: crate::config::SLICKDEALS_API_URL.into(),
            bestbuy_api_url: crate::config::BESTBUY_API_URL.into(),
            bestbuy_api_key: String::new(),
            gemini_api_key: None,
            scrape_interval_secs: 3600,
            sources: vec![],
            min_discount_percent: 0.0,
            max_deals_per_source: 500,
        };
        assert!(GeminiClient::from_config(&cfg).is_none());
    }
}
