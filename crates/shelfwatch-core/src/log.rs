use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::operation::{OperationKind, OperationStatus};
use crate::store::{PageRequest, success_rate};

/// Append-only audit entry for dashboards.
///
/// Weakly references its operation: the operation's lifecycle never
/// depends on these entries, and the core never deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeLogEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    /// Seller id as free text — logs outlive the seller enum.
    pub platform: String,
    pub kind: OperationKind,
    pub url: String,
    pub category: Option<String>,
    pub status: OperationStatus,
    /// Who/what drove the transition, e.g. "System" or "Manual".
    pub action: String,
    pub operation_id: Option<Uuid>,
}

/// DTO for inserting a new log entry. `logged_at` defaults to now.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub logged_at: Option<DateTime<Utc>>,
    pub platform: String,
    pub kind: OperationKind,
    pub url: String,
    pub category: Option<String>,
    pub status: OperationStatus,
    pub action: String,
    pub operation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub platform: Option<String>,
    pub status: Option<OperationStatus>,
    pub kind: Option<OperationKind>,
    pub logged_after: Option<DateTime<Utc>>,
    pub logged_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LogPage {
    pub items: Vec<ScrapeLogEntry>,
    pub total: u64,
}

/// Count of log entries for one status on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLogCount {
    pub day: NaiveDate,
    pub status: OperationStatus,
    pub count: i64,
}

/// Aggregate log statistics over a date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStats {
    pub pending: i64,
    pub in_progress: i64,
    pub success: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub success_rate: f64,
    /// Per-day, per-status counts, ascending by day — chart series.
    pub daily: Vec<DailyLogCount>,
}

impl LogStats {
    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.success + self.failed + self.cancelled
    }

    /// Recompute the success rate from the counts.
    pub fn finalise(mut self) -> Self {
        self.success_rate = success_rate(self.success, self.total());
        self
    }
}

/// Append-only log store.
///
/// The fallible methods report errors normally; callers on the hot path
/// use the `*_quietly` wrappers, which swallow and log failures —
/// logging is observability, not correctness-critical, and must never
/// abort the operation being logged.
pub trait LogStore: Send + Sync + Clone {
    fn append(
        &self,
        entry: NewLogEntry,
    ) -> impl Future<Output = Result<ScrapeLogEntry, ScrapeError>> + Send;

    /// Advance the latest entry for an operation to a new status.
    /// Returns `None` when the operation has no entries yet.
    fn advance(
        &self,
        operation_id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> impl Future<Output = Result<Option<ScrapeLogEntry>, ScrapeError>> + Send;

    /// Explicit correction of a single entry.
    fn update_entry(
        &self,
        id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> impl Future<Output = Result<Option<ScrapeLogEntry>, ScrapeError>> + Send;

    fn list(
        &self,
        filter: &LogFilter,
        page: &PageRequest,
    ) -> impl Future<Output = Result<LogPage, ScrapeError>> + Send;

    fn stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<LogStats, ScrapeError>> + Send;

    /// Best-effort append: failures are logged and discarded.
    fn append_quietly(
        &self,
        entry: NewLogEntry,
    ) -> impl Future<Output = Option<ScrapeLogEntry>> + Send {
        async move {
            match self.append(entry).await {
                Ok(created) => Some(created),
                Err(e) => {
                    tracing::warn!(error = %e, "Log append failed (ignored)");
                    None
                }
            }
        }
    }

    /// Best-effort advance: failures are logged and discarded.
    fn advance_quietly(
        &self,
        operation_id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> impl Future<Output = Option<ScrapeLogEntry>> + Send {
        let action = action.to_string();
        async move {
            match self.advance(operation_id, status, &action).await {
                Ok(updated) => updated,
                Err(e) => {
                    tracing::warn!(
                        operation_id = %operation_id,
                        error = %e,
                        "Log advance failed (ignored)"
                    );
                    None
                }
            }
        }
    }
}
