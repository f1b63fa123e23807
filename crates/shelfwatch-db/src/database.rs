use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use shelfwatch_core::ScrapeError;

use crate::config::DatabaseConfig;
use crate::log_repository::LogRepository;
use crate::operation_repository::OperationRepository;

/// Central database facade — owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ScrapeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), ScrapeError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get an [`OperationRepository`] backed by this pool.
    pub fn operation_repo(&self) -> OperationRepository {
        OperationRepository::new(self.pool.clone())
    }

    /// Get a [`LogRepository`] backed by this pool.
    pub fn log_repo(&self) -> LogRepository {
        LogRepository::new(self.pool.clone())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), ScrapeError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
