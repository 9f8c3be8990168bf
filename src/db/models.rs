//! Database row types matching the schema in migrations/0001_init.sql.
//! Used by sqlx for typed queries.

use crate::types::{DealRecord, Source};

#[derive(Debug, sqlx::FromRow)]
pub struct DealRow {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub price_text: Option<String>,
    pub price_numeric: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub category: Option<String>,
    pub website: String,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub in_stock: i64,
    pub first_seen_at: i64,
    pub scraped_at: i64,
}

impl DealRow {
    /// Convert back into the in-memory record. Rows with a website value this
    /// build does not recognize default to slickdeals rather than failing the
    /// whole seed.
    pub fn into_record(self) -> DealRecord {
        DealRecord {
            title: self.title,
            link: self.link,
            price_text: self.price_text,
            price_numeric: self.price_numeric,
            original_price: self.original_price,
            discount_percent: self.discount_percent,
            category: self.category,
            source: Source::parse(&self.website).unwrap_or(Source::Slickdeals),
            rating: self.rating,
            reviews_count: self.reviews_count,
            in_stock: self.in_stock != 0,
            scraped_at: self.scraped_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PricePointRow {
    pub id: i64,
    pub deal_link: String,
    pub price_numeric: f64,
    pub recorded_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DealStatsRow {
    pub deal_link: String,
    pub quality_score: f64,
    pub recommendation: String,
    pub quality_band: String,
    pub ml_probability_good: Option<f64>,
    pub ml_drop_probability: Option<f64>,
    pub times_seen: i64,
    pub min_price: Option<f64>,
    pub avg_price: Option<f64>,
    pub last_updated: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_into_record_preserves_fields() {
        let row = DealRow {
            id: 1,
            link: "https://example.com/tv".into(),
            title: "Samsung 55\" OLED TV".into(),
            price_text: Some("$899.99".into()),
            price_numeric: Some(899.99),
            original_price: Some(1499.99),
            discount_percent: Some(40.0),
            category: Some("TVs".into()),
            website: "bestbuy".into(),
            rating: Some(4.7),
            reviews_count: Some(1234),
            in_stock: 1,
            first_seen_at: 1_699_000_000,
            scraped_at: 1_700_000_000,
        };
        let record = row.into_record();
        assert_eq!(record.title, "Samsung 55\" OLED TV");
        assert_eq!(record.price_numeric, Some(899.99));
        assert_eq!(record.discount_percent, Some(40.0));
        assert_eq!(record.source, Source::Bestbuy);
        assert!(record.in_stock);
    }
}
