use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::normalize::{
    clean_title, derive_discount, parse_price_text, parse_rating, parse_reviews_count,
    sanitize_discount,
};
use crate::types::{DealRecord, Source};

use super::{now_secs, record_rejection, FetchStats, Rejection};

/// Fetch frontpage deals from the SlickDeals JSON API, applying the discount
/// filter and the per-source cap. Pages until the API runs dry or the cap is
/// reached.
pub async fn fetch_deals(
    client: &reqwest::Client,
    cfg: &Config,
) -> Result<(Vec<DealRecord>, FetchStats)> {
    let mut deals = Vec::new();
    let mut stats = FetchStats::default();
    let mut page = 1usize;
    let page_size = 100usize;
    let scraped_at = now_secs();

    'outer: loop {
        let url = format!(
            "{}?limit={}&page={}&sort=recent",
            cfg.slickdeals_api_url, page_size, page
        );
        let resp: serde_json::Value = client.get(&url).send().await?.json().await?;

        let items = match resp.get("deals").and_then(|d| d.as_array()) {
            Some(a) => a.clone(),
            None => {
                return Err(AppError::Scrape(
                    "slickdeals response had no deals array".to_string(),
                ))
            }
        };
        if items.is_empty() {
            break;
        }
        stats.api_total += items.len();

        for item in &items {
            match parse_deal(item, cfg, scraped_at) {
                Ok(deal) => {
                    deals.push(deal);
                    if deals.len() >= cfg.max_deals_per_source {
                        break 'outer;
                    }
                }
                Err(rejection) => record_rejection(&mut stats, rejection),
            }
        }

        if items.len() < page_size {
            break;
        }
        page += 1;
    }

    stats.qualified = deals.len();
    debug!("slickdeals: {} qualified from {} listings", stats.qualified, stats.api_total);
    Ok((deals, stats))
}

/// Parse one SlickDeals listing object. Price fields arrive as display
/// strings ("$899.99"); the discount comes from the API when present and is
/// derived from list price otherwise.
fn parse_deal(
    v: &serde_json::Value,
    cfg: &Config,
    scraped_at: i64,
) -> std::result::Result<DealRecord, Rejection> {
    let title = v
        .get("title")
        .and_then(|t| t.as_str())
        .map(clean_title)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::NoTitle)?;

    let link = v
        .get("dealUrl")
        .and_then(|l| l.as_str())
        .filter(|l| l.starts_with("http"))
        .map(str::to_string)
        .ok_or(Rejection::NoLink)?;

    let price_text = v
        .get("price")
        .and_then(|p| p.as_str())
        .map(str::to_string);
    let price_numeric = price_text.as_deref().and_then(parse_price_text);

    let original_price = v
        .get("listPrice")
        .and_then(|p| p.as_f64().or_else(|| p.as_str().and_then(parse_price_text)));

    let reported_discount = v
        .get("discountPercent")
        .and_then(|d| d.as_f64().or_else(|| d.as_str().and_then(|s| s.parse().ok())));
    let discount_percent = sanitize_discount(reported_discount)
        .or_else(|| derive_discount(price_numeric, original_price));

    if discount_percent.unwrap_or(0.0) < cfg.min_discount_percent {
        return Err(Rejection::LowDiscount(title));
    }

    let category = v
        .get("categoryName")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    let rating = v
        .get("rating")
        .and_then(|r| r.as_f64().or_else(|| r.as_str().and_then(parse_rating)));

    let reviews_count = v
        .get("commentCount")
        .and_then(|c| c.as_i64().or_else(|| c.as_str().and_then(parse_reviews_count)));

    Ok(DealRecord {
        title,
        link,
        price_text,
        price_numeric,
        original_price,
        discount_percent,
        category,
        source: Source::Slickdeals,
        rating,
        reviews_count,
        in_stock: true,
        scraped_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
