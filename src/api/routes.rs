use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::ai::GeminiClient;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub gemini: Option<Arc<GeminiClient>>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/deals", get(get_deals))
        .route("/deals/top", get(get_top_deals))
        .route("/deals/:id/history", get(get_deal_history))
        .route("/deals/:id/describe", get(describe_deal))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .route("/health", get(get_health))
        .route("/export/csv", get(export_csv))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct DealsQuery {
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub min_discount: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct TopDealsQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Row / response types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct DealWithStatsRow {
    id: i64,
    title: String,
    link: String,
    price_numeric: Option<f64>,
    original_price: Option<f64>,
    discount_percent: Option<f64>,
    category: Option<String>,
    website: String,
    rating: Option<f64>,
    reviews_count: Option<i64>,
    scraped_at: i64,
    quality_score: Option<f64>,
    recommendation: Option<String>,
    quality_band: Option<String>,
    times_seen: Option<i64>,
}

#[derive(Serialize)]
pub struct DealResponse {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub price_numeric: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percent: Option<f64>,
    pub category: Option<String>,
    pub website: String,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub scraped_at: i64,
    pub quality_score: Option<f64>,
    pub recommendation: Option<String>,
    pub quality_band: Option<String>,
    pub times_seen: Option<i64>,
}

impl From<DealWithStatsRow> for DealResponse {
    fn from(r: DealWithStatsRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            link: r.link,
            price_numeric: r.price_numeric,
            original_price: r.original_price,
            discount_percent: r.discount_percent,
            category: r.category,
            website: r.website,
            rating: r.rating,
            reviews_count: r.reviews_count,
            scraped_at: r.scraped_at,
            quality_score: r.quality_score,
            recommendation: r.recommendation,
            quality_band: r.quality_band,
            times_seen: r.times_seen,
        }
    }
}

#[derive(Serialize)]
pub struct PricePointResponse {
    pub price_numeric: f64,
    pub recorded_at: i64,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub total_deals: i64,
    pub deals_today: i64,
    pub avg_price: Option<f64>,
    pub avg_discount: Option<f64>,
    pub top_deals: Vec<DealResponse>,
}

#[derive(Serialize)]
pub struct DescribeResponse {
    pub available: bool,
    pub description: Option<String>,
}

const DEAL_COLUMNS: &str = r#"
    d.id, d.title, d.link, d.price_numeric, d.original_price,
    d.discount_percent, d.category, d.website, d.rating, d.reviews_count,
    d.scraped_at,
    s.quality_score, s.recommendation, s.quality_band, s.times_seen
"#;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_deals(
    State(state): State<ApiState>,
    Query(params): Query<DealsQuery>,
) -> Result<Json<Vec<DealResponse>>, AppError> {
    let limit = params.limit.unwrap_or(200).clamp(1, 1000);

    let rows: Vec<DealWithStatsRow> = sqlx::query_as(&format!(
        r#"
        SELECT {DEAL_COLUMNS}
        FROM deals d
        LEFT JOIN deal_stats s ON d.link = s.deal_link
        ORDER BY s.quality_score DESC NULLS LAST, d.scraped_at DESC
        "#
    ))
    .fetch_all(&state.pool)
    .await?;

    let search = params.search.as_deref().map(str::to_lowercase);
    let deals: Vec<DealResponse> = rows
        .into_iter()
        .filter(|r| {
            search
                .as_deref()
                .map_or(true, |q| r.title.to_lowercase().contains(q))
        })
        .filter(|r| {
            params
                .min_price
                .map_or(true, |min| r.price_numeric.map_or(false, |p| p >= min))
        })
        .filter(|r| {
            params
                .max_price
                .map_or(true, |max| r.price_numeric.map_or(false, |p| p <= max))
        })
        .filter(|r| {
            params
                .source
                .as_deref()
                .map_or(true, |s| r.website.eq_ignore_ascii_case(s))
        })
        .filter(|r| {
            params.category.as_deref().map_or(true, |c| {
                r.category.as_deref().map_or(false, |cat| cat.eq_ignore_ascii_case(c))
            })
        })
        .filter(|r| {
            params
                .min_discount
                .map_or(true, |min| r.discount_percent.map_or(false, |d| d >= min))
        })
        .take(limit as usize)
        .map(DealResponse::from)
        .collect();

    Ok(Json(deals))
}

async fn get_top_deals(
    State(state): State<ApiState>,
    Query(params): Query<TopDealsQuery>,
) -> Result<Json<Vec<DealResponse>>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let rows: Vec<DealWithStatsRow> = sqlx::query_as(&format!(
        r#"
        SELECT {DEAL_COLUMNS}
        FROM deals d
        JOIN deal_stats s ON d.link = s.deal_link
        ORDER BY s.quality_score DESC
        LIMIT ?
        "#
    ))
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(DealResponse::from).collect()))
}

async fn get_deal_history(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PricePointResponse>>, AppError> {
    let link: Option<String> = sqlx::query_scalar("SELECT link FROM deals WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let link = link.ok_or_else(|| AppError::NotFound(format!("deal {id}")))?;

    let rows: Vec<(f64, i64)> = sqlx::query_as(
        "SELECT price_numeric, recorded_at FROM price_history
         WHERE deal_link = ? ORDER BY recorded_at ASC",
    )
    .bind(&link)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(price_numeric, recorded_at)| PricePointResponse { price_numeric, recorded_at })
            .collect(),
    ))
}

async fn describe_deal(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<DescribeResponse>, AppError> {
    let Some(gemini) = state.gemini.as_ref() else {
        return Ok(Json(DescribeResponse { available: false, description: None }));
    };

    let row: Option<crate::db::models::DealRow> =
        sqlx::query_as("SELECT * FROM deals WHERE id = ?")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let row = row.ok_or_else(|| AppError::NotFound(format!("deal {id}")))?;

    let description = gemini.describe_deal(&row.into_record()).await?;
    Ok(Json(DescribeResponse { available: true, description: Some(description) }))
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let total_deals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
        .fetch_one(&state.pool)
        .await?;

    let day_ago = crate::scraper::now_secs() - 86_400;
    let deals_today: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE scraped_at > ?")
            .bind(day_ago)
            .fetch_one(&state.pool)
            .await?;

    let avg_price: Option<f64> =
        sqlx::query_scalar("SELECT AVG(price_numeric) FROM deals WHERE price_numeric IS NOT NULL")
            .fetch_one(&state.pool)
            .await?;

    let avg_discount: Option<f64> = sqlx::query_scalar(
        "SELECT AVG(discount_percent) FROM deals WHERE discount_percent IS NOT NULL",
    )
    .fetch_one(&state.pool)
    .await?;

    let top_rows: Vec<DealWithStatsRow> = sqlx::query_as(&format!(
        r#"
        SELECT {DEAL_COLUMNS}
        FROM deals d
        JOIN deal_stats s ON d.link = s.deal_link
        ORDER BY s.quality_score DESC
        LIMIT 10
        "#
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(SummaryResponse {
        total_deals,
        deals_today,
        avg_price,
        avg_discount,
        top_deals: top_rows.into_iter().map(DealResponse::from).collect(),
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(serde_json::json!({
        "p50_ms": p50,
        "p95_ms": p95,
        "p99_ms": p99,
        "sample_count": state.latency.len(),
    }))
}

async fn get_health(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, AppError> {
    let total_deals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(serde_json::json!({
        "last_scrape_at": state.health.last_scrape_at(),
        "deals_observed_total": state.health.deals_observed_total(),
        "write_queue_pending": state.health.write_queue_pending(),
        "total_deals": total_deals,
        "ai_enabled": state.gemini.is_some(),
    })))
}

/// Stream the full deals table as CSV, scored columns included.
async fn export_csv(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    let rows: Vec<DealWithStatsRow> = sqlx::query_as(&format!(
        r#"
        SELECT {DEAL_COLUMNS}
        FROM deals d
        LEFT JOIN deal_stats s ON d.link = s.deal_link
        ORDER BY s.quality_score DESC NULLS LAST
        "#
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "title",
            "link",
            "price_numeric",
            "original_price",
            "discount_percent",
            "category",
            "website",
            "rating",
            "reviews_count",
            "quality_score",
            "recommendation",
        ])
        .map_err(AppError::from)?;
    for r in rows {
        writer
            .write_record([
                r.title.as_str(),
                r.link.as_str(),
                &opt_num(r.price_numeric),
                &opt_num(r.original_price),
                &opt_num(r.discount_percent),
                r.category.as_deref().unwrap_or(""),
                r.website.as_str(),
                &opt_num(r.rating),
                &r.reviews_count.map(|v| v.to_string()).unwrap_or_default(),
                &opt_num(r.quality_score),
                r.recommendation.as_deref().unwrap_or(""),
            ])
            .map_err(AppError::from)?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| AppError::Scrape(format!("CSV flush failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"deals_export.csv\""),
        ],
        body,
    ))
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|x| format!("{x}")).unwrap_or_default()
}
