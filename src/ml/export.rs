use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::config::ML_EXPORT_INTERVAL_SECS;
use crate::db::models::{DealRow, PricePointRow};
use crate::error::Result;
use crate::ml::features::{FeatureVector, FEATURE_NAMES};
use crate::pipeline::backup::format_timestamp;
use crate::types::PricePoint;

/// Background task that consolidates stored deals into a training feature
/// matrix CSV under `<output_dir>/ml_data`, one file per run. The last
/// column is the heuristic deal_quality_score target the offline notebook
/// trains against.
pub struct MlExporter {
    pool: sqlx::SqlitePool,
    ml_dir: PathBuf,
}

impl MlExporter {
    pub fn new(pool: sqlx::SqlitePool, output_dir: &Path) -> Self {
        Self { pool, ml_dir: output_dir.join("ml_data") }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(ML_EXPORT_INTERVAL_SECS));
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            match self.export(crate::scraper::now_secs()).await {
                Ok((path, rows)) => {
                    info!("ML feature export: {rows} rows → {}", path.display())
                }
                Err(e) => error!("ML export error: {e}"),
            }
        }
    }

    pub async fn export(&self, now: i64) -> Result<(PathBuf, usize)> {
        let deals: Vec<DealRow> = sqlx::query_as("SELECT * FROM deals ORDER BY scraped_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let history_rows: Vec<PricePointRow> =
            sqlx::query_as("SELECT * FROM price_history ORDER BY deal_link, recorded_at")
                .fetch_all(&self.pool)
                .await?;
        let mut history: HashMap<String, Vec<PricePoint>> = HashMap::new();
        for row in history_rows {
            history.entry(row.deal_link.clone()).or_default().push(PricePoint {
                deal_link: row.deal_link,
                price_numeric: row.price_numeric,
                recorded_at: row.recorded_at,
            });
        }

        let max_discount = deals
            .iter()
            .filter_map(|d| d.discount_percent)
            .fold(0.0_f64, f64::max);

        std::fs::create_dir_all(&self.ml_dir)?;
        let path = self.ml_dir.join(format!("ml_features_{}.csv", format_timestamp(now)));
        let mut writer = csv::Writer::from_path(&path)?;

        let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
        header.push("deal_quality_score");
        writer.write_record(&header)?;

        let mut rows = 0usize;
        for row in deals {
            let target = target_score(
                row.discount_percent.unwrap_or(0.0),
                row.rating.unwrap_or(0.0),
                row.reviews_count.unwrap_or(0),
                max_discount,
            );
            let record = row.into_record();
            let points = history.get(&record.link).map(Vec::as_slice).unwrap_or(&[]);
            let features = FeatureVector::build(&record, points);

            let mut fields: Vec<String> =
                features.as_slice().iter().map(|v| format!("{v}")).collect();
            fields.push(format!("{target:.2}"));
            writer.write_record(&fields)?;
            rows += 1;
        }
        writer.flush()?;

        Ok((path, rows))
    }
}

/// Heuristic training target on the 0-100 scale: 40% relative discount,
/// 30% rating, 30% review volume (capped at 100 reviews).
pub fn target_score(discount: f64, rating: f64, reviews: i64, max_discount: f64) -> f64 {
    let discount_part = if max_discount > 0.0 {
        (discount / max_discount).clamp(0.0, 1.0) * 40.0
    } else {
        0.0
    };
    let rating_part = (rating / 5.0).clamp(0.0, 1.0) * 30.0;
    let reviews_part = (reviews.clamp(0, 100) as f64) / 100.0 * 30.0;
    discount_part + rating_part + reviews_part
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::writer::{insert_price_point, upsert_deal};
    use crate::types::{DealRecord, Source};

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn deal(link: &str, discount: f64, rating: f64, reviews: i64) -> DealRecord {
        DealRecord {
            title: format!("Deal {link}"),
            link: link.to_string(),
            price_text: None,
            price_numeric: Some(100.0),
            original_price: None,
            discount_percent: Some(discount),
            category: None,
            source: Source::Slickdeals,
            rating: Some(rating),
            reviews_count: Some(reviews),
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[test]
    fn target_score_components() {
        // Best discount in the set, perfect rating, saturated reviews
        assert!((target_score(50.0, 5.0, 500, 50.0) - 100.0).abs() < 1e-9);
        // No signal at all
        assert_eq!(target_score(0.0, 0.0, 0, 50.0), 0.0);
        // Empty dataset guard
        assert_eq!(target_score(0.0, 0.0, 0, 0.0), 0.0);
        // Half discount, mid rating
        let s = target_score(25.0, 2.5, 50, 50.0);
        assert!((s - (20.0 + 15.0 + 15.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn export_writes_feature_matrix() {
        let pool = test_pool().await;
        upsert_deal(&pool, &deal("https://a.example/1", 40.0, 4.5, 120)).await.unwrap();
        upsert_deal(&pool, &deal("https://a.example/2", 10.0, 3.0, 5)).await.unwrap();
        insert_price_point(&pool, "https://a.example/1", 100.0, 1_699_000_000).await.unwrap();
        insert_price_point(&pool, "https://a.example/1", 90.0, 1_700_000_000).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let exporter = MlExporter::new(pool, dir.path());
        let (path, rows) = exporter.export(1_700_000_000).await.unwrap();

        assert_eq!(rows, 2);
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("price_numeric,discount_percent"));
        assert!(header.ends_with("deal_quality_score"));
        assert_eq!(lines.count(), 2);
    }

    #[tokio::test]
    async fn export_on_empty_db_produces_header_only() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let exporter = MlExporter::new(pool, dir.path());
        let (path, rows) = exporter.export(0).await.unwrap();
        assert_eq!(rows, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
