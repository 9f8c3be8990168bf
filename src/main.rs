mod ai;
mod api;
mod config;
mod db;
mod error;
mod ml;
mod pipeline;
mod scorer;
mod scraper;
mod state;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::ai::GeminiClient;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::models::DealRow;
use crate::db::writer::DbWriter;
use crate::error::Result;
use crate::ml::export::MlExporter;
use crate::ml::model::ModelArtifact;
use crate::scorer::DealScorer;
use crate::scraper::ScrapeRunner;
use crate::state::DealStore;
use crate::types::DealEvent;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&cfg.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.database_url);

    // --- In-memory deal store, seeded from existing rows ---
    let store = DealStore::new();
    let existing: Vec<DealRow> = sqlx::query_as("SELECT * FROM deals")
        .fetch_all(&pool)
        .await?;
    let seeded = existing.len();
    store.seed(existing.into_iter().map(DealRow::into_record).collect());
    info!("Seeded deal store with {seeded} known deals");

    // --- Model artifact (optional) ---
    let model = ModelArtifact::load_optional(Path::new(&cfg.model_path));
    if model.is_none() {
        warn!("Running without a model — recommendations use the discount-only path");
    }

    // --- Shared instrumentation ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- Channels ---
    let (deal_tx, deal_rx) = mpsc::channel::<DealEvent>(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // DB writer: persists observed deals and flushes CSV backups per cycle
    let writer = DbWriter::new(
        pool.clone(),
        deal_rx,
        Arc::clone(&store),
        PathBuf::from(&cfg.output_dir),
        Arc::clone(&health),
    );
    tokio::spawn(async move { writer.run().await });

    // Scrape runner: first cycle fires immediately, then on the interval
    let runner = ScrapeRunner::new(
        cfg.clone(),
        Arc::clone(&store),
        deal_tx,
        Arc::clone(&latency),
        Arc::clone(&health),
    );
    tokio::spawn(async move { runner.run().await });

    // Deal scorer (background, every 60s)
    let deal_scorer = DealScorer::new(pool.clone(), model);
    tokio::spawn(async move { deal_scorer.run().await });

    // ML feature export (background, hourly)
    let exporter = MlExporter::new(pool.clone(), Path::new(&cfg.output_dir));
    tokio::spawn(async move { exporter.run().await });

    // --- Optional Gemini client for deal descriptions ---
    let gemini = GeminiClient::from_config(&cfg).map(Arc::new);
    if gemini.is_none() {
        info!("GEMINI_API_KEY not set — AI descriptions disabled");
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        pool: pool.clone(),
        health: Arc::clone(&health),
        latency: Arc::clone(&latency),
        gemini,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
