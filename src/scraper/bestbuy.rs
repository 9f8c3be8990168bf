use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::normalize::{clean_title, derive_discount, sanitize_discount};
use crate::types::{DealRecord, Source};

use super::{now_secs, record_rejection, FetchStats, Rejection};

/// Fetch on-sale products from the Best Buy Products API. Numeric fields
/// arrive typed (salePrice/regularPrice as numbers), unlike SlickDeals.
/// Requires an API key; the runner skips this source when the key is empty.
pub async fn fetch_deals(
    client: &reqwest::Client,
    cfg: &Config,
) -> Result<(Vec<DealRecord>, FetchStats)> {
    if cfg.bestbuy_api_key.is_empty() {
        return Err(AppError::Config(
            "BESTBUY_API_KEY not set — bestbuy source disabled".to_string(),
        ));
    }

    let mut deals = Vec::new();
    let mut stats = FetchStats::default();
    let mut page = 1usize;
    let page_size = 100usize;
    let scraped_at = now_secs();

    'outer: loop {
        let url = format!(
            "{}/products(onSale=true)?apiKey={}&format=json&pageSize={}&page={}&sort=percentSavings.dsc",
            cfg.bestbuy_api_url, cfg.bestbuy_api_key, page_size, page
        );
        let resp: serde_json::Value = client.get(&url).send().await?.json().await?;

        let items = match resp.get("products").and_then(|p| p.as_array()) {
            Some(a) => a.clone(),
            None => {
                return Err(AppError::Scrape(
                    "bestbuy response had no products array".to_string(),
                ))
            }
        };
        if items.is_empty() {
            break;
        }
        stats.api_total += items.len();

        for item in &items {
            match parse_product(item, cfg, scraped_at) {
                Ok(deal) => {
                    deals.push(deal);
                    if deals.len() >= cfg.max_deals_per_source {
                        break 'outer;
                    }
                }
                Err(rejection) => record_rejection(&mut stats, rejection),
            }
        }

        let total_pages = resp.get("totalPages").and_then(|t| t.as_u64()).unwrap_or(1);
        if page as u64 >= total_pages {
            break;
        }
        page += 1;
    }

    stats.qualified = deals.len();
    debug!("bestbuy: {} qualified from {} products", stats.qualified, stats.api_total);
    Ok((deals, stats))
}

fn parse_product(
    v: &serde_json::Value,
    cfg: &Config,
    scraped_at: i64,
) -> std::result::Result<DealRecord, Rejection> {
    let title = v
        .get("name")
        .and_then(|n| n.as_str())
        .map(clean_title)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::NoTitle)?;

    let link = v
        .get("url")
        .and_then(|u| u.as_str())
        .filter(|u| u.starts_with("http"))
        .map(str::to_string)
        .ok_or(Rejection::NoLink)?;

    let in_stock = v
        .get("onlineAvailability")
        .and_then(|a| a.as_bool())
        .unwrap_or(true);
    if !in_stock {
        return Err(Rejection::OutOfStock);
    }

    let price_numeric = v.get("salePrice").and_then(|p| p.as_f64()).filter(|p| *p > 0.0);
    let original_price = v.get("regularPrice").and_then(|p| p.as_f64()).filter(|p| *p > 0.0);

    let reported_discount = v.get("percentSavings").and_then(|d| {
        d.as_f64().or_else(|| d.as_str().and_then(|s| s.parse().ok()))
    });
    let discount_percent = sanitize_discount(reported_discount)
        .or_else(|| derive_discount(price_numeric, original_price));

    if discount_percent.unwrap_or(0.0) < cfg.min_discount_percent {
        return Err(Rejection::LowDiscount(title));
    }

    // Deepest category path segment, e.g. Electronics > TVs > OLED TVs → "OLED TVs"
    let category = v
        .get("categoryPath")
        .and_then(|c| c.as_array())
        .and_then(|a| a.last())
        .and_then(|e| e.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);

    let rating = v
        .get("customerReviewAverage")
        .and_then(|r| r.as_f64().or_else(|| r.as_str().and_then(|s| s.parse().ok())));

    let reviews_count = v.get("customerReviewCount").and_then(|c| c.as_i64());

    Ok(DealRecord {
        title,
        link,
        price_text: price_numeric.map(|p| format!("${p:.2}")),
        price_numeric,
        original_price,
        discount_percent,
        category,
        source: Source::Bestbuy,
        rating,
        reviews_count,
        in_stock,
        scraped_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config {
            log_level: "info".into(),
            database_url: "sqlite::memory:".into(),
            api_port: 3000,
            output_dir: "output".into(),
            model_path: "models/deal_model.json".into(),
            slickdeals_api_url: crate::config::SLICKDEALS_API_URL.into(),
            bestbuy_api_url: crate::config::BESTBUY_API_URL.into(),
            bestbuy_api_key: "test-key".into(),
            gemini_api_key: None,
            scrape_interval_secs: 3600,
            sources: vec!["bestbuy".into()],
            min_discount_percent: 0.0,
            max_deals_per_source: 500,
        }
    }

    #[test]
    fn parses_product() {
        let v = serde_json::json!({
            "name": "Insignia 50\" 4K TV",
            "url": "https://www.bestbuy.com/site/123.p",
            "salePrice": 249.99,
            "regularPrice": 399.99,
            "percentSavings": "37.5",
            "customerReviewAverage": "4.6",
            "customerReviewCount": 1873,
            "onlineAvailability": true,
            "categoryPath": [
                {"name": "Electronics"},
                {"name": "TVs"},
                {"name": "4K TVs"}
            ]
        });
        let deal = parse_product(&v, &cfg(), 1_700_000_000).ok().unwrap();
        assert_eq!(deal.price_numeric, Some(249.99));
        assert_eq!(deal.original_price, Some(399.99));
        assert_eq!(deal.discount_percent, Some(37.5));
        assert_eq!(deal.category.as_deref(), Some("4K TVs"));
        assert_eq!(deal.rating, Some(4.6));
        assert_eq!(deal.price_text.as_deref(), Some("$249.99"));
    }

    #[test]
    fn out_of_stock_rejected() {
        let v = serde_json::json!({
            "name": "Sold out thing",
            "url": "https://www.bestbuy.com/site/456.p",
            "salePrice": 10.0,
            "onlineAvailability": false
        });
        assert!(matches!(
            parse_product(&v, &cfg(), 0),
            Err(Rejection::OutOfStock)
        ));
    }

    #[test]
    fn derives_discount_when_percent_savings_missing() {
        let v = serde_json::json!({
            "name": "Monitor",
            "url": "https://www.bestbuy.com/site/789.p",
            "salePrice": 150.0,
            "regularPrice": 200.0
        });
        let deal = parse_product(&v, &cfg(), 0).ok().unwrap();
        assert_eq!(deal.discount_percent, Some(25.0));
    }
}
