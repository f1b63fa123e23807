use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use shelfwatch_client::{HttpFetcher, PageFetcher, default_registry};
use shelfwatch_core::operation::ProcessorConfig;
use shelfwatch_core::{FileResultStore, JobProcessor, ScrapeEngine};
use shelfwatch_db::Database;
use shelfwatch_server::routes;
use shelfwatch_server::state::AppState;

pub const TEST_API_KEY: &str = "test-api-key";

/// SQL migration statements, kept in sync with the workspace
/// `migrations/` directory.
const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS scrape_operations (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        url VARCHAR NOT NULL,
        seller VARCHAR(20) NOT NULL,
        kind VARCHAR(10) NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        attempt_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ,
        total_products INTEGER NOT NULL DEFAULT 0,
        scraped_products INTEGER NOT NULL DEFAULT 0,
        failed_products INTEGER NOT NULL DEFAULT 0,
        progress_current INTEGER NOT NULL DEFAULT 0,
        progress_total INTEGER NOT NULL DEFAULT 0,
        progress_percentage INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        error_details JSONB,
        retry_count INTEGER NOT NULL DEFAULT 0,
        max_retries INTEGER NOT NULL DEFAULT 3,
        use_browser BOOLEAN NOT NULL DEFAULT TRUE,
        timeout_ms BIGINT NOT NULL DEFAULT 30000,
        wait_time_ms BIGINT NOT NULL DEFAULT 3000,
        scraped_data JSONB,
        data_file VARCHAR,
        category VARCHAR,
        notes TEXT,
        tags TEXT[] NOT NULL DEFAULT '{}',
        ip_address VARCHAR(45),
        user_agent VARCHAR,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scrape_logs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        logged_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        platform VARCHAR(50) NOT NULL,
        kind VARCHAR(10) NOT NULL,
        url VARCHAR NOT NULL,
        category VARCHAR,
        status VARCHAR(20) NOT NULL,
        action VARCHAR(100) NOT NULL,
        operation_id UUID
    )"#,
];

pub struct TestApp {
    pub router: Router,
    _container: ContainerAsync<GenericImage>,
    _results_dir: tempfile::TempDir,
}

/// Spins up PostgreSQL, applies migrations, and builds the full router
/// with a non-started processor.
pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "shelfwatch_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");
    let connection_string = format!("postgresql://postgres:postgres@{host}:{port}/shelfwatch_test");

    let pool = connect_with_retry(&connection_string).await;
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    let db = Database::from_pool(pool);
    let results_dir = tempfile::tempdir().expect("tempdir");
    let results = FileResultStore::new(results_dir.path());

    let fetcher = PageFetcher::new(HttpFetcher::new().expect("http client"));
    let engine = ScrapeEngine::new(
        fetcher,
        db.operation_repo(),
        db.log_repo(),
        results.clone(),
        Arc::new(default_registry()),
    );
    let processor = JobProcessor::new(engine, results.clone(), ProcessorConfig::default());

    let state = Arc::new(AppState {
        db,
        processor,
        results,
        api_key: TEST_API_KEY.to_string(),
    });

    TestApp {
        router: routes::router(state),
        _container: container,
        _results_dir: results_dir,
    }
}

async fn connect_with_retry(connection_string: &str) -> PgPool {
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await
        {
            Ok(pool) => return pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}
