//! Deal-quality scoring. The score is a deterministic blend of the listing's
//! discount percentage and, when a model artifact is loaded, the model's
//! probability that this is a good deal. No model → discount-only path, same
//! output shape.
//!
//! Scale and weighting (documented contract):
//!   discount_score = min(discount_percent * 1.25, 100)
//!   blended        = 0.6 * discount_score + 0.4 * probability_good
//! Recommendation: >= 70 BuyNow, >= 40 Wait, else Skip. A predicted price
//! drop above 60% demotes BuyNow to Wait.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{score_thresholds, DISCOUNT_SCALE, DISCOUNT_WEIGHT, SCORER_INTERVAL_SECS};
use crate::db::models::{DealRow, PricePointRow};
use crate::error::{AppError, Result};
use crate::ml::features::FeatureVector;
use crate::ml::model::ModelArtifact;
use crate::types::{DealRecord, MlPrediction, PricePoint, QualityBand, Recommendation, ScoredDeal};

// ---------------------------------------------------------------------------
// Pure scoring
// ---------------------------------------------------------------------------

/// Discount-only component on the 0-100 scale.
pub fn discount_score(discount_percent: f64) -> f64 {
    (discount_percent * DISCOUNT_SCALE).min(100.0)
}

/// Score one deal. `prediction` is optional — absent model output yields the
/// discount-only score. A deal without a usable discount_percent is a
/// validation error, never a silent default.
pub fn score_deal(deal: &DealRecord, prediction: Option<&MlPrediction>) -> Result<ScoredDeal> {
    let discount = deal.discount_percent.ok_or_else(|| {
        AppError::Validation(format!("deal {} has no discount_percent", deal.link))
    })?;
    if !discount.is_finite() || !(0.0..=100.0).contains(&discount) {
        return Err(AppError::Validation(format!(
            "deal {} discount_percent {discount} outside 0-100",
            deal.link
        )));
    }

    let base = discount_score(discount);
    let score = match prediction {
        Some(p) => DISCOUNT_WEIGHT * base + (1.0 - DISCOUNT_WEIGHT) * p.probability_good,
        None => base,
    };

    let mut recommendation = if score >= score_thresholds::BUY_MIN {
        Recommendation::BuyNow
    } else if score >= score_thresholds::WAIT_MIN {
        Recommendation::Wait
    } else {
        Recommendation::Skip
    };

    // A confidently predicted price drop means waiting beats buying now.
    if recommendation == Recommendation::BuyNow {
        if let Some(p) = prediction {
            if p.drop_probability > score_thresholds::DROP_DEMOTE_MIN {
                recommendation = Recommendation::Wait;
            }
        }
    }

    Ok(ScoredDeal {
        score,
        recommendation,
        band: QualityBand::from_score(score),
        used_model: prediction.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Background rescoring task
// ---------------------------------------------------------------------------

/// Rescores every stored deal on an interval and upserts deal_stats.
/// The model artifact is loaded once at startup; a missing artifact keeps
/// the task on the discount-only path for its lifetime.
pub struct DealScorer {
    pool: sqlx::SqlitePool,
    model: Option<ModelArtifact>,
}

impl DealScorer {
    pub fn new(pool: sqlx::SqlitePool, model: Option<ModelArtifact>) -> Self {
        Self { pool, model }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(SCORER_INTERVAL_SECS));
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            if let Err(e) = self.score_all_deals().await {
                error!("Scorer error: {e}");
            }
        }
    }

    pub async fn score_all_deals(&self) -> Result<()> {
        let now = crate::scraper::now_secs();

        let deals: Vec<DealRow> = sqlx::query_as("SELECT * FROM deals")
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

        let mut scored = 0usize;
        let mut skipped = 0usize;
        for row in deals {
            let record = row.into_record();
            let points = history.get(&record.link).map(Vec::as_slice).unwrap_or(&[]);

            let prediction = self
                .model
                .as_ref()
                .map(|m| m.predict(&FeatureVector::build(&record, points)));

            let result = match score_deal(&record, prediction.as_ref()) {
                Ok(s) => s,
                Err(AppError::Validation(_)) => {
                    // No discount signal yet — leave unscored rather than guess
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let times_seen = points.len().max(1) as i64;
            let min_price = points
                .iter()
                .map(|p| p.price_numeric)
                .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))));
            let avg_price = if points.is_empty() {
                record.price_numeric
            } else {
                Some(points.iter().map(|p| p.price_numeric).sum::<f64>() / points.len() as f64)
            };

            upsert_stats(
                &self.pool,
                &record.link,
                &result,
                prediction.as_ref(),
                times_seen,
                min_price,
                avg_price,
                now,
            )
            .await?;
            scored += 1;
        }

        info!("Scorer updated stats for {scored} deals ({skipped} without discount skipped)");
        debug!(model_loaded = self.model.is_some(), "scoring pass complete");
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn upsert_stats(
    pool: &sqlx::SqlitePool,
    link: &str,
    scored: &ScoredDeal,
    prediction: Option<&MlPrediction>,
    times_seen: i64,
    min_price: Option<f64>,
    avg_price: Option<f64>,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO deal_stats (
            deal_link, quality_score, recommendation, quality_band,
            ml_probability_good, ml_drop_probability,
            times_seen, min_price, avg_price, last_updated
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(deal_link) DO UPDATE SET
            quality_score = excluded.quality_score,
            recommendation = excluded.recommendation,
            quality_band = excluded.quality_band,
            ml_probability_good = excluded.ml_probability_good,
            ml_drop_probability = excluded.ml_drop_probability,
            times_seen = excluded.times_seen,
            min_price = excluded.min_price,
            avg_price = excluded.avg_price,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(link)
    .bind(scored.score)
    .bind(scored.recommendation.to_string())
    .bind(scored.band.to_string())
    .bind(prediction.map(|p| p.probability_good))
    .bind(prediction.map(|p| p.drop_probability))
    .bind(times_seen)
    .bind(min_price)
    .bind(avg_price)
    .bind(now)
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
    use crate::types::Source;

    fn deal(discount: Option<f64>) -> DealRecord {
        DealRecord {
            title: "Samsung 55\" OLED TV".to_string(),
            link: "https://example.com/tv".to_string(),
            price_text: Some("$899.99".to_string()),
            price_numeric: Some(899.99),
            original_price: Some(1499.99),
            discount_percent: discount,
            category: None,
            source: Source::Slickdeals,
            rating: None,
            reviews_count: None,
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[test]
    fn discount_only_is_deterministic() {
        let d = deal(Some(40.0));
        let a = score_deal(&d, None).unwrap();
        let b = score_deal(&d, None).unwrap();
        assert_eq!(a, b);
        assert!(!a.used_model);
        assert!((a.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_discount_is_never_buy_now() {
        let scored = score_deal(&deal(Some(0.0)), None).unwrap();
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.recommendation, Recommendation::Skip);
        assert_eq!(scored.band, QualityBand::Poor);
    }

    #[test]
    fn higher_discount_ranks_higher() {
        // 40%-off Samsung TV vs an otherwise identical 10%-off deal
        let strong = score_deal(&deal(Some(40.0)), None).unwrap();
        let weak = score_deal(&deal(Some(10.0)), None).unwrap();
        assert!(strong.score > weak.score);
    }

    #[test]
    fn discount_score_caps_at_100() {
        assert_eq!(discount_score(100.0), 100.0);
        assert_eq!(discount_score(80.0), 100.0);
        assert!((discount_score(40.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn recommendation_thresholds() {
        // 56% discount → 70.0 exactly → BuyNow
        let buy = score_deal(&deal(Some(56.0)), None).unwrap();
        assert_eq!(buy.recommendation, Recommendation::BuyNow);
        // 32% discount → 40.0 exactly → Wait
        let wait = score_deal(&deal(Some(32.0)), None).unwrap();
        assert_eq!(wait.recommendation, Recommendation::Wait);
        // 31% → 38.75 → Skip
        let skip = score_deal(&deal(Some(31.0)), None).unwrap();
        assert_eq!(skip.recommendation, Recommendation::Skip);
    }

    #[test]
    fn blend_uses_model_probability() {
        let p = MlPrediction { probability_good: 100.0, drop_probability: 0.0 };
        let scored = score_deal(&deal(Some(40.0)), Some(&p)).unwrap();
        // 0.6 * 50 + 0.4 * 100 = 70
        assert!((scored.score - 70.0).abs() < 1e-9);
        assert_eq!(scored.recommendation, Recommendation::BuyNow);
        assert!(scored.used_model);

        let weak = MlPrediction { probability_good: 0.0, drop_probability: 0.0 };
        let scored = score_deal(&deal(Some(40.0)), Some(&weak)).unwrap();
        // 0.6 * 50 = 30 → Skip
        assert!((scored.score - 30.0).abs() < 1e-9);
        assert_eq!(scored.recommendation, Recommendation::Skip);
    }

    #[test]
    fn predicted_drop_demotes_buy_to_wait() {
        let p = MlPrediction { probability_good: 100.0, drop_probability: 75.0 };
        let scored = score_deal(&deal(Some(80.0)), Some(&p)).unwrap();
        assert!(scored.score >= score_thresholds::BUY_MIN);
        assert_eq!(scored.recommendation, Recommendation::Wait);

        // Drop prediction never promotes a Skip
        let p = MlPrediction { probability_good: 0.0, drop_probability: 75.0 };
        let scored = score_deal(&deal(Some(0.0)), Some(&p)).unwrap();
        assert_eq!(scored.recommendation, Recommendation::Skip);
    }

    #[test]
    fn missing_discount_is_validation_error() {
        let err = score_deal(&deal(None), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn out_of_range_discount_is_validation_error() {
        assert!(matches!(
            score_deal(&deal(Some(150.0)), None).unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            score_deal(&deal(Some(-1.0)), None).unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            score_deal(&deal(Some(f64::NAN)), None).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn missing_artifact_falls_back_to_discount_only() {
        // End to end: artifact path does not exist → no model → valid score
        let model = ModelArtifact::load_optional(std::path::Path::new("/nonexistent/model.json"));
        assert!(model.is_none());
        let prediction = model.map(|m| m.predict(&FeatureVector::build(&deal(Some(40.0)), &[])));
        let scored = score_deal(&deal(Some(40.0)), prediction.as_ref()).unwrap();
        assert!(!scored.used_model);
        assert!((scored.score - 50.0).abs() < 1e-9);
    }

    mod task {
        use super::*;
        use crate::db::models::DealStatsRow;
        use crate::db::writer::{insert_price_point, upsert_deal};

        async fn test_pool() -> sqlx::SqlitePool {
            let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
            sqlx::migrate!("./migrations").run(&pool).await.unwrap();
            pool
        }

        #[tokio::test]
        async fn scoring_pass_upserts_stats() {
            let pool = test_pool().await;
            upsert_deal(&pool, &deal(Some(40.0))).await.unwrap();
            insert_price_point(&pool, "https://example.com/tv", 999.99, 1_699_000_000)
                .await
                .unwrap();
            insert_price_point(&pool, "https://example.com/tv", 899.99, 1_700_000_000)
                .await
                .unwrap();

            let scorer = DealScorer::new(pool.clone(), None);
            scorer.score_all_deals().await.unwrap();
            // Second pass must overwrite, not duplicate
            scorer.score_all_deals().await.unwrap();

            let rows: Vec<DealStatsRow> = sqlx::query_as("SELECT * FROM deal_stats")
                .fetch_all(&pool)
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
            let stats = &rows[0];
            assert!((stats.quality_score - 50.0).abs() < 1e-9);
            assert_eq!(stats.recommendation, "wait");
            assert_eq!(stats.quality_band, "fair");
            assert_eq!(stats.times_seen, 2);
            assert_eq!(stats.min_price, Some(899.99));
            assert!(stats.ml_probability_good.is_none());
        }

        #[tokio::test]
        async fn deals_without_discount_are_skipped() {
            let pool = test_pool().await;
            upsert_deal(&pool, &deal(None)).await.unwrap();

            let scorer = DealScorer::new(pool.clone(), None);
            scorer.score_all_deals().await.unwrap();

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deal_stats")
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }
}
