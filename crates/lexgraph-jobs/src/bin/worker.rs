//! Background worker for processing document tasks.
//!
//! Run with: `cargo run --bin lexgraph-worker`
//!
//! Environment variables:
//!   DATABASE_URL  - PostgreSQL connection string (required)
//!   NER_BASE_URL  - NER sidecar base URL (required for entity extraction)
//!   RUST_LOG      - standard env filter (default: "lexgraph=info")
//!   WORKER_*      - see `WorkerConfig::from_env`

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use lexgraph_core::TextExtractor;
use lexgraph_db::Database;
use lexgraph_extract::{HttpNerBackend, PdfExtractor};
use lexgraph_jobs::{
    EntityExtractionHandler, TextExtractionHandler, WorkerBuilder, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lexgraph=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let database_url = std::env::var(lexgraph_core::defaults::ENV_DATABASE_URL)
        .context("DATABASE_URL must be set")?;

    let db = Database::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    let extractor = Arc::new(PdfExtractor::new());
    if !extractor.health_check().await.unwrap_or(false) {
        warn!("pdftotext not found on PATH; text extraction tasks will fail");
    }

    let mut builder = WorkerBuilder::new(db.clone())
        .with_config(WorkerConfig::from_env())
        .with_handler(TextExtractionHandler::new(db.clone(), extractor));

    match HttpNerBackend::from_env() {
        Some(ner) => {
            builder = builder
                .with_handler(EntityExtractionHandler::new(db.clone(), Arc::new(ner)));
        }
        None => {
            warn!("NER_BASE_URL not set; entity extraction tasks will fail");
        }
    }

    let worker = builder.build().await;
    let handle = worker.start();

    info!("Worker running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    handle.shutdown().await.ok();
    info!("Worker shut down");
    Ok(())
}
