use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::operation::{
    CompletedOutcome, CreateOperationRequest, OperationConfig, OperationKind, OperationStatus,
    Progress, ScrapeOperation, lifecycle,
};
use shelfwatch_core::seller::Seller;
use shelfwatch_core::store::{
    OperationFilter, OperationPage, OperationStore, PageRequest, SellerStats, SortOrder, SortSpec,
    StatusCounts, success_rate,
};

/// PostgreSQL-backed operation store.
///
/// Lifecycle updates load the row, apply the pure transition from
/// `shelfwatch_core::operation::lifecycle`, and persist under an
/// optimistic `WHERE status = <previous>` guard — a lost race or a
/// violated precondition both surface as `InvalidTransition`.
#[derive(Clone)]
pub struct OperationRepository {
    pool: Pool<Postgres>,
}

impl OperationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.get(id)
            .await?
            .ok_or_else(|| ScrapeError::NotFound(format!("operation {id}")))
    }

    /// Persist a transitioned operation, guarding on the status the
    /// transition started from.
    async fn persist_transition(
        &self,
        op: &ScrapeOperation,
        expected_status: OperationStatus,
    ) -> Result<(), ScrapeError> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_operations
            SET status = $2, attempt_time = $3, started_at = $4, finished_at = $5,
                total_products = $6, scraped_products = $7, failed_products = $8,
                progress_current = $9, progress_total = $10, progress_percentage = $11,
                error_message = $12, error_details = $13, retry_count = $14,
                scraped_data = $15, data_file = $16, updated_at = $17
            WHERE id = $1 AND status = $18
            "#,
        )
        .bind(op.id)
        .bind(op.status.as_str())
        .bind(op.attempt_time)
        .bind(op.started_at)
        .bind(op.finished_at)
        .bind(op.total_products as i32)
        .bind(op.scraped_products as i32)
        .bind(op.failed_products as i32)
        .bind(op.progress.current as i32)
        .bind(op.progress.total as i32)
        .bind(op.progress.percentage as i32)
        .bind(&op.error_message)
        .bind(&op.error_details)
        .bind(op.retry_count as i32)
        .bind(&op.scraped_data)
        .bind(&op.data_file)
        .bind(op.updated_at)
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ScrapeError::InvalidTransition(format!(
                "operation {} was no longer '{}' when the update applied",
                op.id, expected_status
            )));
        }
        Ok(())
    }

    async fn transition<T>(&self, id: Uuid, apply: T) -> Result<ScrapeOperation, ScrapeError>
    where
        T: FnOnce(ScrapeOperation) -> Result<ScrapeOperation, ScrapeError>,
    {
        let before = self.load(id).await?;
        let expected_status = before.status;
        let after = apply(before)?;
        self.persist_transition(&after, expected_status).await?;
        Ok(after)
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: Uuid,
    url: String,
    seller: String,
    kind: String,
    status: String,
    attempt_time: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    total_products: i32,
    scraped_products: i32,
    failed_products: i32,
    progress_current: i32,
    progress_total: i32,
    progress_percentage: i32,
    error_message: Option<String>,
    error_details: Option<serde_json::Value>,
    retry_count: i32,
    max_retries: i32,
    use_browser: bool,
    timeout_ms: i64,
    wait_time_ms: i64,
    scraped_data: Option<serde_json::Value>,
    data_file: Option<String>,
    category: Option<String>,
    notes: Option<String>,
    tags: Vec<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OperationRow> for ScrapeOperation {
    fn from(row: OperationRow) -> Self {
        ScrapeOperation {
            id: row.id,
            url: row.url,
            seller: row.seller.parse().unwrap_or(Seller::Amazon),
            kind: row.kind.parse().unwrap_or(OperationKind::Product),
            status: row.status.parse().unwrap_or(OperationStatus::Pending),
            attempt_time: row.attempt_time,
            started_at: row.started_at,
            finished_at: row.finished_at,
            total_products: row.total_products as u32,
            scraped_products: row.scraped_products as u32,
            failed_products: row.failed_products as u32,
            progress: Progress {
                current: row.progress_current as u32,
                total: row.progress_total as u32,
                percentage: row.progress_percentage as u32,
            },
            error_message: row.error_message,
            error_details: row.error_details,
            retry_count: row.retry_count as u32,
            max_retries: row.max_retries as u32,
            config: OperationConfig {
                use_browser: row.use_browser,
                timeout_ms: row.timeout_ms as u64,
                wait_time_ms: row.wait_time_ms as u64,
            },
            scraped_data: row.scraped_data,
            data_file: row.data_file,
            category: row.category,
            notes: row.notes,
            tags: row.tags,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Append the filter's WHERE conditions to a query builder.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OperationFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(seller) = filter.seller {
        qb.push(" AND seller = ").push_bind(seller.as_str());
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(pattern) = &filter.category {
        qb.push(" AND category ~* ").push_bind(pattern.clone());
    }
    if let Some(after) = filter.created_after {
        qb.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND created_at <= ").push_bind(before);
    }
    if let Some(search) = &filter.search {
        let needle = format!("%{search}%");
        qb.push(" AND (url ILIKE ")
            .push_bind(needle.clone())
            .push(" OR category ILIKE ")
            .push_bind(needle.clone())
            .push(" OR notes ILIKE ")
            .push_bind(needle)
            .push(")");
    }
}

/// Whitelist sort columns; anything unknown falls back to created_at.
fn sort_column(sort_by: &str) -> &'static str {
    match sort_by {
        "updated_at" => "updated_at",
        "attempt_time" => "attempt_time",
        "status" => "status",
        "seller" => "seller",
        "url" => "url",
        _ => "created_at",
    }
}

impl OperationStore for OperationRepository {
    async fn create(
        &self,
        request: CreateOperationRequest,
    ) -> Result<ScrapeOperation, ScrapeError> {
        // Query-then-insert: the narrow race window between the check
        // and the insert is a documented limitation.
        let (active,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM scrape_operations
                WHERE url = $1 AND status IN ('pending', 'in_progress')
            )
            "#,
        )
        .bind(&request.url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        if active {
            return Err(ScrapeError::Conflict(format!(
                "an active operation already exists for URL {}",
                request.url
            )));
        }

        let row = sqlx::query_as::<_, OperationRow>(
            r#"
            INSERT INTO scrape_operations
                (url, seller, kind, max_retries, use_browser, timeout_ms, wait_time_ms,
                 category, notes, tags, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&request.url)
        .bind(request.seller.as_str())
        .bind(request.kind.as_str())
        .bind(request.max_retries.unwrap_or(3) as i32)
        .bind(request.config.use_browser)
        .bind(request.config.timeout_ms as i64)
        .bind(request.config.wait_time_ms as i64)
        .bind(&request.category)
        .bind(&request.notes)
        .bind(&request.tags)
        .bind(&request.ip_address)
        .bind(&request.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScrapeOperation>, ScrapeError> {
        let row =
            sqlx::query_as::<_, OperationRow>(r#"SELECT * FROM scrape_operations WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        filter: &OperationFilter,
        sort: &SortSpec,
        page: &PageRequest,
    ) -> Result<OperationPage, ScrapeError> {
        let mut count_qb =
            QueryBuilder::new("SELECT COUNT(*) FROM scrape_operations WHERE TRUE");
        push_filters(&mut count_qb, filter);
        let (total,): (i64,) = count_qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        let mut qb = QueryBuilder::new("SELECT * FROM scrape_operations WHERE TRUE");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY ").push(sort_column(&sort.sort_by));
        qb.push(match sort.order {
            SortOrder::Asc => " ASC",
            SortOrder::Desc => " DESC",
        });
        qb.push(" LIMIT ").push_bind(i64::from(page.limit));
        qb.push(" OFFSET ").push_bind(page.offset() as i64);

        let rows: Vec<OperationRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(OperationPage {
            items: rows.into_iter().map(Into::into).collect(),
            total: total as u64,
        })
    }

    async fn delete(&self, id: Uuid) -> Result<(), ScrapeError> {
        let result = sqlx::query(r#"DELETE FROM scrape_operations WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ScrapeError::NotFound(format!("operation {id}")));
        }
        Ok(())
    }

    async fn mark_started(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::start(op, Utc::now())).await
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        outcome: CompletedOutcome,
    ) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::complete(op, outcome, Utc::now()))
            .await
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::fail(op, message, details, Utc::now()))
            .await
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::cancel(op, Utc::now())).await
    }

    async fn increment_retry(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::retry(op, Utc::now())).await
    }

    async fn pending_ready(&self) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT * FROM scrape_operations
            WHERE status = 'pending'
            ORDER BY attempt_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn failed_retryable(&self) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT * FROM scrape_operations
            WHERE status = 'failed' AND retry_count < max_retries
            ORDER BY finished_at ASC NULLS FIRST
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn terminal_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT * FROM scrape_operations
            WHERE status IN ('success', 'failed')
              AND COALESCE(finished_at, updated_at) < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_status(&self, status: OperationStatus) -> Result<i64, ScrapeError> {
        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM scrape_operations WHERE status = $1"#)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(count)
    }

    async fn status_counts(&self) -> Result<StatusCounts, ScrapeError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT status, COUNT(*) FROM scrape_operations GROUP BY status"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status.parse() {
                Ok(OperationStatus::Pending) => counts.pending = count,
                Ok(OperationStatus::InProgress) => counts.in_progress = count,
                Ok(OperationStatus::Success) => counts.success = count,
                Ok(OperationStatus::Failed) => counts.failed = count,
                Ok(OperationStatus::Cancelled) => counts.cancelled = count,
                Err(_) => {}
            }
        }
        Ok(counts)
    }

    async fn seller_stats(&self) -> Result<Vec<SellerStats>, ScrapeError> {
        let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT seller,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'success') AS success,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                   COUNT(*) FILTER (WHERE status IN ('pending', 'in_progress')) AS active
            FROM scrape_operations
            GROUP BY seller
            ORDER BY total DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|(seller, total, success, failed, active)| {
                let seller: Seller = seller.parse().ok()?;
                Some(SellerStats {
                    seller,
                    total,
                    success,
                    failed,
                    active,
                    success_rate: success_rate(success, total),
                })
            })
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT * FROM scrape_operations
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScrapeError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
