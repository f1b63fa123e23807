use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::log::{
    DailyLogCount, LogFilter, LogPage, LogStats, LogStore, NewLogEntry, ScrapeLogEntry,
};
use shelfwatch_core::operation::{OperationKind, OperationStatus};
use shelfwatch_core::store::PageRequest;

/// PostgreSQL-backed log store. Entries are append-only; the only
/// mutation is advancing an operation's latest entry (or an explicit
/// correction), and nothing here ever deletes.
#[derive(Clone)]
pub struct LogRepository {
    pool: Pool<Postgres>,
}

impl LogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    logged_at: DateTime<Utc>,
    platform: String,
    kind: String,
    url: String,
    category: Option<String>,
    status: String,
    action: String,
    operation_id: Option<Uuid>,
}

impl From<LogRow> for ScrapeLogEntry {
    fn from(row: LogRow) -> Self {
        ScrapeLogEntry {
            id: row.id,
            logged_at: row.logged_at,
            platform: row.platform,
            kind: row.kind.parse().unwrap_or(OperationKind::Product),
            url: row.url,
            category: row.category,
            status: row.status.parse().unwrap_or(OperationStatus::Pending),
            action: row.action,
            operation_id: row.operation_id,
        }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &LogFilter) {
    if let Some(platform) = &filter.platform {
        qb.push(" AND platform = ").push_bind(platform.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(after) = filter.logged_after {
        qb.push(" AND logged_at >= ").push_bind(after);
    }
    if let Some(before) = filter.logged_before {
        qb.push(" AND logged_at <= ").push_bind(before);
    }
}

impl LogStore for LogRepository {
    async fn append(&self, entry: NewLogEntry) -> Result<ScrapeLogEntry, ScrapeError> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            INSERT INTO scrape_logs
                (logged_at, platform, kind, url, category, status, action, operation_id)
            VALUES (COALESCE($1, NOW()), $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.logged_at)
        .bind(&entry.platform)
        .bind(entry.kind.as_str())
        .bind(&entry.url)
        .bind(&entry.category)
        .bind(entry.status.as_str())
        .bind(&entry.action)
        .bind(entry.operation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(row.into())
    }

    async fn advance(
        &self,
        operation_id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> Result<Option<ScrapeLogEntry>, ScrapeError> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            UPDATE scrape_logs
            SET status = $2, action = $3
            WHERE id = (
                SELECT id FROM scrape_logs
                WHERE operation_id = $1
                ORDER BY logged_at DESC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(operation_id)
        .bind(status.as_str())
        .bind(action)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn update_entry(
        &self,
        id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> Result<Option<ScrapeLogEntry>, ScrapeError> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            UPDATE scrape_logs
            SET status = $2, action = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(action)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, filter: &LogFilter, page: &PageRequest) -> Result<LogPage, ScrapeError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM scrape_logs WHERE TRUE");
        push_filters(&mut count_qb, filter);
        let (total,): (i64,) = count_qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        let mut qb = QueryBuilder::new("SELECT * FROM scrape_logs WHERE TRUE");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY logged_at DESC");
        qb.push(" LIMIT ").push_bind(i64::from(page.limit));
        qb.push(" OFFSET ").push_bind(page.offset() as i64);

        let rows: Vec<LogRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(LogPage {
            items: rows.into_iter().map(Into::into).collect(),
            total: total as u64,
        })
    }

    async fn stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<LogStats, ScrapeError> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM scrape_logs
            WHERE ($1::timestamptz IS NULL OR logged_at >= $1)
              AND ($2::timestamptz IS NULL OR logged_at <= $2)
            GROUP BY status
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        let mut stats = LogStats::default();
        for (status, count) in counts {
            match status.parse() {
                Ok(OperationStatus::Pending) => stats.pending = count,
                Ok(OperationStatus::InProgress) => stats.in_progress = count,
                Ok(OperationStatus::Success) => stats.success = count,
                Ok(OperationStatus::Failed) => stats.failed = count,
                Ok(OperationStatus::Cancelled) => stats.cancelled = count,
                Err(_) => {}
            }
        }

        let daily: Vec<(NaiveDate, String, i64)> = sqlx::query_as(
            r#"
            SELECT DATE(logged_at) AS day, status, COUNT(*)
            FROM scrape_logs
            WHERE ($1::timestamptz IS NULL OR logged_at >= $1)
              AND ($2::timestamptz IS NULL OR logged_at <= $2)
            GROUP BY day, status
            ORDER BY day ASC, status ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        stats.daily = daily
            .into_iter()
            .filter_map(|(day, status, count)| {
                Some(DailyLogCount {
                    day,
                    status: status.parse().ok()?,
                    count,
                })
            })
            .collect();

        Ok(stats.finalise())
    }
}
