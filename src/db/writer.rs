use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::error::Result;
use crate::pipeline::backup::write_cycle_backup;
use crate::state::DealStore;
use crate::types::{DealEvent, DealRecord};

/// Receives DealEvents from the scrape runner and persists them to SQLite.
/// Runs as a dedicated background task — never blocks the scrape path.
/// Row-level write errors are logged and skipped so one bad listing cannot
/// stall the cycle.
pub struct DbWriter {
    pool: sqlx::SqlitePool,
    deal_rx: mpsc::Receiver<DealEvent>,
    store: Arc<DealStore>,
    output_dir: PathBuf,
    health: Arc<HealthState>,
}

impl DbWriter {
    pub fn new(
        pool: sqlx::SqlitePool,
        deal_rx: mpsc::Receiver<DealEvent>,
        store: Arc<DealStore>,
        output_dir: PathBuf,
        health: Arc<HealthState>,
    ) -> Self {
        Self { pool, deal_rx, store, output_dir, health }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.deal_rx.recv().await {
            match event {
                DealEvent::Observed { deal, price_point } => {
                    if let Err(e) = upsert_deal(&self.pool, &deal).await {
                        error!("DB write error for {}: {e}", deal.link);
                    } else if price_point {
                        if let Some(price) = deal.price_numeric {
                            if let Err(e) =
                                insert_price_point(&self.pool, &deal.link, price, deal.scraped_at)
                                    .await
                            {
                                error!("Price history write error for {}: {e}", deal.link);
                            }
                        }
                    }
                    self.health.dec_write_queue_pending();
                }
                DealEvent::CycleComplete { cycle_started_at } => {
                    let snapshot = self.store.snapshot();
                    match write_cycle_backup(&snapshot, &self.output_dir, cycle_started_at) {
                        Ok(path) => {
                            info!("CSV backup written: {} ({} deals)", path.display(), snapshot.len())
                        }
                        Err(e) => error!("CSV backup error: {e}"),
                    }
                }
            }
        }
    }
}

/// Insert or update one deal row keyed on link. `first_seen_at` survives
/// updates; everything else reflects the latest observation.
pub async fn upsert_deal(pool: &sqlx::SqlitePool, deal: &DealRecord) -> Result<()> {
    let website = deal.source.to_string();
    sqlx::query(
        r#"
        INSERT INTO deals (
            link, title, price_text, price_numeric, original_price,
            discount_percent, category, website, rating, reviews_count,
            in_stock, first_seen_at, scraped_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(link) DO UPDATE SET
            title = excluded.title,
            price_text = excluded.price_text,
            price_numeric = excluded.price_numeric,
            original_price = excluded.original_price,
            discount_percent = excluded.discount_percent,
            category = excluded.category,
            website = excluded.website,
            rating = excluded.rating,
            reviews_count = excluded.reviews_count,
            in_stock = excluded.in_stock,
            scraped_at = excluded.scraped_at
        "#,
    )
    .bind(&deal.link)
    .bind(&deal.title)
    .bind(&deal.price_text)
    .bind(deal.price_numeric)
    .bind(deal.original_price)
    .bind(deal.discount_percent)
    .bind(&deal.category)
    .bind(&website)
    .bind(deal.rating)
    .bind(deal.reviews_count)
    .bind(i64::from(deal.in_stock))
    .bind(deal.scraped_at)
    .bind(deal.scraped_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_price_point(
    pool: &sqlx::SqlitePool,
    link: &str,
    price: f64,
    recorded_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO price_history (deal_link, price_numeric, recorded_at) VALUES (?, ?, ?)",
    )
    .bind(link)
    .bind(price)
    .bind(recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DealRow;
    use crate::types::Source;

    async fn test_pool() -> sqlx::SqlitePool {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn deal() -> DealRecord {
        DealRecord {
            title: "Samsung 55\" OLED TV".to_string(),
            link: "https://example.com/tv".to_string(),
            price_text: Some("$899.99".to_string()),
            price_numeric: Some(899.99),
            original_price: Some(1499.99),
            discount_percent: Some(40.0),
            category: Some("TVs".to_string()),
            source: Source::Bestbuy,
            rating: Some(4.7),
            reviews_count: Some(1234),
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn deal_roundtrip_preserves_fields() {
        let pool = test_pool().await;
        upsert_deal(&pool, &deal()).await.unwrap();

        let row: DealRow = sqlx::query_as("SELECT * FROM deals WHERE link = ?")
            .bind("https://example.com/tv")
            .fetch_one(&pool)
            .await
            .unwrap();
        let record = row.into_record();
        assert_eq!(record.title, "Samsung 55\" OLED TV");
        assert_eq!(record.price_numeric, Some(899.99));
        assert_eq!(record.discount_percent, Some(40.0));
    }

    #[tokio::test]
    async fn upsert_keeps_first_seen_and_updates_price() {
        let pool = test_pool().await;
        let mut d = deal();
        upsert_deal(&pool, &d).await.unwrap();

        d.price_numeric = Some(799.99);
        d.scraped_at = 1_700_100_000;
        upsert_deal(&pool, &d).await.unwrap();

        let row: DealRow = sqlx::query_as("SELECT * FROM deals WHERE link = ?")
            .bind(&d.link)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.first_seen_at, 1_700_000_000);
        assert_eq!(row.scraped_at, 1_700_100_000);
        assert_eq!(row.price_numeric, Some(799.99));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn price_history_appends() {
        let pool = test_pool().await;
        let d = deal();
        upsert_deal(&pool, &d).await.unwrap();
        insert_price_point(&pool, &d.link, 899.99, 1_700_000_000).await.unwrap();
        insert_price_point(&pool, &d.link, 799.99, 1_700_100_000).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE deal_link = ?")
                .bind(&d.link)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 2);
    }
}
