use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Deal record
// ---------------------------------------------------------------------------

/// One scraped product listing. `link` is the uniqueness key — repeated
/// scrapes of the same link upsert the stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealRecord {
    pub title: String,
    pub link: String,
    pub price_text: Option<String>,
    pub price_numeric: Option<f64>,
    pub original_price: Option<f64>,
    /// 0-100. None when the listing carried neither a discount nor an
    /// original price to derive one from.
    pub discount_percent: Option<f64>,
    pub category: Option<String>,
    pub source: Source,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub in_stock: bool,
    /// Unix seconds.
    pub scraped_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Slickdeals,
    Bestbuy,
}

impl Source {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "slickdeals" => Some(Source::Slickdeals),
            "bestbuy" => Some(Source::Bestbuy),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Slickdeals => "slickdeals",
            Source::Bestbuy => "bestbuy",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Price history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub deal_link: String,
    pub price_numeric: f64,
    /// Unix seconds.
    pub recorded_at: i64,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    BuyNow,
    Wait,
    Skip,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::BuyNow => "buy_now",
            Recommendation::Wait => "wait",
            Recommendation::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

/// Display band on the 0-100 quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    /// score >= 75
    Excellent,
    /// score 60-75
    Good,
    /// score 40-60
    Fair,
    /// score < 40
    Poor,
}

impl QualityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            QualityBand::Excellent
        } else if score >= 60.0 {
            QualityBand::Good
        } else if score >= 40.0 {
            QualityBand::Fair
        } else {
            QualityBand::Poor
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QualityBand::Excellent => "excellent",
            QualityBand::Good => "good",
            QualityBand::Fair => "fair",
            QualityBand::Poor => "poor",
        };
        write!(f, "{s}")
    }
}

/// Model output attached to a deal when an artifact is loaded.
/// Both probabilities are on the 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlPrediction {
    pub probability_good: f64,
    pub drop_probability: f64,
}

/// Scorer output for one deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDeal {
    pub score: f64,
    pub recommendation: Recommendation,
    pub band: QualityBand,
    /// False when the score came from the discount-only fallback path.
    pub used_model: bool,
}

// ---------------------------------------------------------------------------
// Channel message types
// ---------------------------------------------------------------------------

/// Routed from the scrape runner to the DB writer.
#[derive(Debug, Clone)]
pub enum DealEvent {
    /// A normalized listing from the current cycle (new or re-seen).
    /// `price_point` is set when this observation should append a
    /// price-history row (new deal with a price, or price changed).
    Observed { deal: DealRecord, price_point: bool },
    /// Marks the end of one scrape cycle; the writer flushes its CSV backup.
    CycleComplete { cycle_started_at: i64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(QualityBand::from_score(75.0), QualityBand::Excellent);
        assert_eq!(QualityBand::from_score(74.9), QualityBand::Good);
        assert_eq!(QualityBand::from_score(60.0), QualityBand::Good);
        assert_eq!(QualityBand::from_score(40.0), QualityBand::Fair);
        assert_eq!(QualityBand::from_score(39.9), QualityBand::Poor);
        assert_eq!(QualityBand::from_score(0.0), QualityBand::Poor);
    }

    #[test]
    fn source_roundtrip() {
        assert_eq!(Source::parse("SlickDeals"), Some(Source::Slickdeals));
        assert_eq!(Source::parse("bestbuy"), Some(Source::Bestbuy));
        assert_eq!(Source::parse("newegg"), None);
        assert_eq!(Source::Bestbuy.to_string(), "bestbuy");
    }
}
