use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use shelfwatch_client::{HttpFetcher, PageFetcher, default_registry};
use shelfwatch_core::operation::ProcessorConfig;
use shelfwatch_core::{FileResultStore, JobProcessor, ScrapeEngine};
use shelfwatch_db::{Database, DatabaseConfig};
use shelfwatch_server::routes;
use shelfwatch_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shelfwatch=info".parse()?))
        .with_target(false)
        .init();

    let api_key =
        std::env::var("SHELFWATCH_API_KEY").expect("SHELFWATCH_API_KEY must be set");
    let port = std::env::var("SHELFWATCH_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let results_dir =
        std::env::var("SHELFWATCH_RESULTS_DIR").unwrap_or_else(|_| "results".to_string());
    let results = FileResultStore::new(results_dir);

    let fetcher = build_fetcher().await?;
    let engine = ScrapeEngine::new(
        fetcher,
        db.operation_repo(),
        db.log_repo(),
        results.clone(),
        Arc::new(default_registry()),
    );

    let mut processor_config = ProcessorConfig::default();
    if let Ok(raw) = std::env::var("SHELFWATCH_POLL_INTERVAL_MS") {
        processor_config = processor_config.with_poll_interval(Duration::from_millis(raw.parse()?));
    }
    if let Ok(raw) = std::env::var("SHELFWATCH_CHUNK_SIZE") {
        processor_config = processor_config.with_chunk_size(raw.parse()?);
    }
    let processor = JobProcessor::new(engine, results.clone(), processor_config);

    let autostart = std::env::var("SHELFWATCH_PROCESSOR_AUTOSTART")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    if autostart {
        processor.start();
    }

    let state = Arc::new(AppState {
        db,
        processor: processor.clone(),
        results,
        api_key,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let any in-flight pass settle before exiting.
    processor.stop().await;

    Ok(())
}

async fn build_fetcher() -> anyhow::Result<PageFetcher> {
    let http = HttpFetcher::new()?;

    #[cfg(feature = "browser")]
    {
        match shelfwatch_client::BrowserFetcher::new().await {
            Ok(browser) => return Ok(PageFetcher::new(http).with_browser(browser)),
            Err(e) => {
                tracing::warn!(error = %e, "Browser unavailable, rendered fetches fall back to HTTP");
            }
        }
    }

    Ok(PageFetcher::new(http))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
