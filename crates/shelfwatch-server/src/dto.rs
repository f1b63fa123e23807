use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shelfwatch_core::log::{DailyLogCount, LogStats, ScrapeLogEntry};
use shelfwatch_core::operation::{Progress, ScrapeOperation};
use shelfwatch_core::processor::{PassSummary, ProcessorStatus, RetryOutcome};
use shelfwatch_core::store::{SellerStats, StatusCounts};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateOperationBody {
    /// Target page URL
    pub url: String,
    /// Seller id (fixed enum, e.g. "flipkart")
    pub seller: String,
    /// "product" or "category"
    #[serde(rename = "type")]
    pub kind: String,
    /// Render in a headless browser (default: true)
    pub use_browser: Option<bool>,
    /// Fetch timeout in ms, 5000–120000 (default: 30000)
    pub timeout_ms: Option<u64>,
    /// Post-render settle time in ms, 1000–10000 (default: 3000)
    pub wait_time_ms: Option<u64>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProgressDto {
    pub current: u32,
    pub total: u32,
    pub percentage: u32,
}

impl From<Progress> for ProgressDto {
    fn from(p: Progress) -> Self {
        Self {
            current: p.current,
            total: p.total,
            percentage: p.percentage,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationResponse {
    pub id: Uuid,
    pub url: String,
    pub seller: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub attempt_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Milliseconds between start and finish, when both are set.
    pub duration_ms: Option<i64>,
    pub total_products: u32,
    pub scraped_products: u32,
    pub failed_products: u32,
    pub progress: ProgressDto,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub use_browser: bool,
    pub timeout_ms: u64,
    pub wait_time_ms: u64,
    pub data_file: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScrapeOperation> for OperationResponse {
    fn from(op: ScrapeOperation) -> Self {
        let duration_ms = op.duration().map(|d| d.num_milliseconds());
        Self {
            id: op.id,
            url: op.url,
            seller: op.seller.to_string(),
            kind: op.kind.to_string(),
            status: op.status.to_string(),
            attempt_time: op.attempt_time,
            started_at: op.started_at,
            finished_at: op.finished_at,
            duration_ms,
            total_products: op.total_products,
            scraped_products: op.scraped_products,
            failed_products: op.failed_products,
            progress: op.progress.into(),
            error_message: op.error_message,
            error_details: op.error_details,
            retry_count: op.retry_count,
            max_retries: op.max_retries,
            use_browser: op.config.use_browser,
            timeout_ms: op.config.timeout_ms,
            wait_time_ms: op.config.wait_time_ms,
            data_file: op.data_file,
            category: op.category,
            notes: op.notes,
            tags: op.tags,
            created_at: op.created_at,
            updated_at: op.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationEnvelope {
    pub success: bool,
    pub message: String,
    pub operation: OperationResponse,
}

impl OperationEnvelope {
    pub fn new(message: impl Into<String>, op: ScrapeOperation) -> Self {
        Self {
            success: true,
            message: message.into(),
            operation: op.into(),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListOperationsQuery {
    pub status: Option<String>,
    pub seller: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Case-insensitive regex over the category field
    pub category: Option<String>,
    /// Free-text search over url/category/notes
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    /// "asc" or "desc" (default: desc)
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationListResponse {
    pub success: bool,
    pub operations: Vec<OperationResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct CompleteOperationBody {
    pub scraped_data: Option<serde_json::Value>,
    pub data_file: Option<String>,
    pub total_products: Option<u32>,
    pub scraped_products: Option<u32>,
    pub failed_products: Option<u32>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FailOperationBody {
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationDataResponse {
    pub success: bool,
    /// "inline" when served from the record, "file" when read from disk
    pub source: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatusCountsDto {
    pub pending: i64,
    pub in_progress: i64,
    pub success: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl From<StatusCounts> for StatusCountsDto {
    fn from(c: StatusCounts) -> Self {
        Self {
            pending: c.pending,
            in_progress: c.in_progress,
            success: c.success,
            failed: c.failed,
            cancelled: c.cancelled,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SellerStatsDto {
    pub seller: String,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub active: i64,
    pub success_rate: f64,
}

impl From<SellerStats> for SellerStatsDto {
    fn from(s: SellerStats) -> Self {
        Self {
            seller: s.seller.to_string(),
            total: s.total,
            success: s.success,
            failed: s.failed,
            active: s.active,
            success_rate: s.success_rate,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationStatsResponse {
    pub success: bool,
    pub counts: StatusCountsDto,
    pub sellers: Vec<SellerStatsDto>,
    pub recent: Vec<OperationResponse>,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProcessorStatusResponse {
    pub success: bool,
    pub running: bool,
    pub interval_ms: u64,
    pub pending: i64,
    pub in_progress: i64,
    pub counts: StatusCountsDto,
    pub sellers: Vec<SellerStatsDto>,
    pub recent: Vec<OperationResponse>,
}

impl From<ProcessorStatus> for ProcessorStatusResponse {
    fn from(s: ProcessorStatus) -> Self {
        Self {
            success: true,
            running: s.running,
            interval_ms: s.interval_ms,
            pending: s.pending,
            in_progress: s.in_progress,
            counts: s.counts.into(),
            sellers: s.sellers.into_iter().map(Into::into).collect(),
            recent: s.recent.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PassSummaryResponse {
    pub success: bool,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl From<PassSummary> for PassSummaryResponse {
    fn from(s: PassSummary) -> Self {
        Self {
            success: true,
            processed: s.processed,
            succeeded: s.succeeded,
            failed: s.failed,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RetryOutcomeDto {
    pub id: Uuid,
    pub success: bool,
    pub error: Option<String>,
}

impl From<RetryOutcome> for RetryOutcomeDto {
    fn from(o: RetryOutcome) -> Self {
        Self {
            id: o.id,
            success: o.error.is_none(),
            error: o.error,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RetryReportResponse {
    pub success: bool,
    pub attempted: usize,
    pub outcomes: Vec<RetryOutcomeDto>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CleanupBody {
    /// Delete terminal operations older than this many days
    pub days_old: u32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted: Vec<Uuid>,
    pub count: usize,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct IntervalBody {
    /// New polling interval in milliseconds (minimum 1000)
    pub interval_ms: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateLogBody {
    pub logged_at: Option<DateTime<Utc>>,
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub category: Option<String>,
    pub status: String,
    /// Defaults to "Manual" — the API is the manual pathway
    pub action: Option<String>,
    pub operation_id: Option<Uuid>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogResponse {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub category: Option<String>,
    pub status: String,
    pub action: String,
    pub operation_id: Option<Uuid>,
}

impl From<ScrapeLogEntry> for LogResponse {
    fn from(e: ScrapeLogEntry) -> Self {
        Self {
            id: e.id,
            logged_at: e.logged_at,
            platform: e.platform,
            kind: e.kind.to_string(),
            url: e.url,
            category: e.category,
            status: e.status.to_string(),
            action: e.action,
            operation_id: e.operation_id,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListLogsQuery {
    pub platform: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogListResponse {
    pub success: bool,
    pub logs: Vec<LogResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateLogBody {
    pub status: String,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LogStatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DailyCountDto {
    pub day: NaiveDate,
    pub status: String,
    pub count: i64,
}

impl From<DailyLogCount> for DailyCountDto {
    fn from(d: DailyLogCount) -> Self {
        Self {
            day: d.day,
            status: d.status.to_string(),
            count: d.count,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogStatsResponse {
    pub success: bool,
    pub pending: i64,
    pub in_progress: i64,
    #[serde(rename = "succeeded")]
    pub success_count: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub success_rate: f64,
    pub daily: Vec<DailyCountDto>,
}

impl From<LogStats> for LogStatsResponse {
    fn from(s: LogStats) -> Self {
        Self {
            success: true,
            pending: s.pending,
            in_progress: s.in_progress,
            success_count: s.success,
            failed: s.failed,
            cancelled: s.cancelled,
            success_rate: s.success_rate,
            daily: s.daily.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health & errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    /// Machine-usable error code, e.g. "conflict"
    pub error: String,
    pub message: String,
}
