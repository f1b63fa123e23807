use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// SQL migration statements, executed one at a time.
/// Kept in sync with the workspace `migrations/` directory.
pub const MIGRATIONS: &[&str] = &[
    // 0001_scrape_operations.sql
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
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT chk_scrape_operations_status CHECK (
            status IN ('pending', 'in_progress', 'success', 'failed', 'cancelled')
        ),
        CONSTRAINT chk_scrape_operations_kind CHECK (kind IN ('product', 'category')),
        CONSTRAINT chk_scrape_operations_seller CHECK (
            seller IN ('amazon', 'flipkart', 'myntra', 'ajio', 'nykaa', 'snapdeal',
                       'meesho', 'pharmeasy', 'netmeds', 'one_mg')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_operations_pending
        ON scrape_operations(attempt_time) WHERE status = 'pending'"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_operations_active_url
        ON scrape_operations(url) WHERE status IN ('pending', 'in_progress')"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_operations_retryable
        ON scrape_operations(retry_count) WHERE status = 'failed'"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_operations_status
        ON scrape_operations(status, created_at DESC)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_operations_seller
        ON scrape_operations(seller, created_at DESC)"#,
    // 0002_scrape_logs.sql
    r#"CREATE TABLE IF NOT EXISTS scrape_logs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        logged_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        platform VARCHAR(50) NOT NULL,
        kind VARCHAR(10) NOT NULL,
        url VARCHAR NOT NULL,
        category VARCHAR,
        status VARCHAR(20) NOT NULL,
        action VARCHAR(100) NOT NULL,
        operation_id UUID,
        CONSTRAINT chk_scrape_logs_status CHECK (
            status IN ('pending', 'in_progress', 'success', 'failed', 'cancelled')
        )
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_logs_operation
        ON scrape_logs(operation_id, logged_at DESC)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_logs_logged_at
        ON scrape_logs(logged_at)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scrape_logs_status
        ON scrape_logs(status, logged_at DESC)"#,
];

/// Spins up a PostgreSQL container and returns a connected pool.
///
/// The `ContainerAsync` must be kept in scope for the test duration —
/// dropping it will stop the container.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
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

    // Retry connection until container is fully ready
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to database after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    // Run migrations one statement at a time
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}
