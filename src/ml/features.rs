//! Feature engineering for the deal-quality model. The feature list and
//! order are frozen: the model artifact is trained offline against exactly
//! these names, and prediction fails closed if they drift.

use crate::pipeline::backup::civil_from_days;
use crate::types::{DealRecord, PricePoint, Source};

/// Fixed feature order. Must match the artifact's feature_names.
pub const FEATURE_NAMES: [&str; 17] = [
    "price_numeric",
    "discount_percent",
    "rating",
    "reviews_count",
    "website_bestbuy",
    "website_slickdeals",
    "category_gaming",
    "category_laptop",
    "category_monitor",
    "day_of_week",
    "month",
    "is_weekend",
    "price_vs_avg",
    "price_vs_min",
    "times_seen",
    "price_std",
    "recent_trend",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Build the feature vector for one deal, using its price history when
    /// available. History-less deals get the neutral defaults the model was
    /// trained with (ratios 1.0, times_seen 1, zero spread/trend).
    pub fn build(deal: &DealRecord, history: &[PricePoint]) -> Self {
        let price = deal.price_numeric.unwrap_or(0.0);

        let (day_of_week, month, is_weekend) = temporal_parts(deal.scraped_at);

        let category = deal.category.as_deref().unwrap_or("").to_lowercase();
        let category_gaming =
            flag(category.contains("gaming") || category.contains("game"));
        let category_laptop =
            flag(category.contains("laptop") || category.contains("notebook"));
        let category_monitor =
            flag(category.contains("monitor") || category.contains("display"));

        let (price_vs_avg, price_vs_min, times_seen, price_std, recent_trend) =
            history_parts(price, history);

        Self([
            price,
            deal.discount_percent.unwrap_or(0.0),
            deal.rating.unwrap_or(0.0),
            deal.reviews_count.unwrap_or(0) as f64,
            flag(deal.source == Source::Bestbuy),
            flag(deal.source == Source::Slickdeals),
            category_gaming,
            category_laptop,
            category_monitor,
            day_of_week,
            month,
            is_weekend,
            price_vs_avg,
            price_vs_min,
            times_seen,
            price_std,
            recent_trend,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// (day_of_week Monday=0, month 1-12, is_weekend) from unix seconds, UTC.
fn temporal_parts(secs: i64) -> (f64, f64, f64) {
    let days = secs.div_euclid(86_400);
    // 1970-01-01 was a Thursday (weekday 3 with Monday=0)
    let weekday = (days + 3).rem_euclid(7);
    let (_, month, _) = civil_from_days(days);
    (weekday as f64, month as f64, flag(weekday >= 5))
}

fn history_parts(price: f64, history: &[PricePoint]) -> (f64, f64, f64, f64, f64) {
    if history.is_empty() || price <= 0.0 {
        return (1.0, 1.0, 1.0, 0.0, 0.0);
    }

    let prices: Vec<f64> = history.iter().map(|p| p.price_numeric).collect();
    let n = prices.len() as f64;
    let avg = prices.iter().sum::<f64>() / n;
    let min = prices.iter().cloned().fold(f64::INFINITY, f64::min);

    let price_vs_avg = if avg > 0.0 { price / avg } else { 1.0 };
    let price_vs_min = if min > 0.0 { price / min } else { 1.0 };

    let variance = prices.iter().map(|p| (p - avg).powi(2)).sum::<f64>() / n;
    let price_std = variance.sqrt();

    // Relative move across the last 5 observations
    let recent_trend = if prices.len() >= 5 {
        let tail = &prices[prices.len() - 5..];
        let first = tail[0];
        if first > 0.0 { (tail[4] - first) / first } else { 0.0 }
    } else {
        0.0
    };

    (price_vs_avg, price_vs_min, n, price_std, recent_trend)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
