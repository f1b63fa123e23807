use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::operation::{
    CompletedOutcome, CreateOperationRequest, OperationKind, OperationStatus, ScrapeOperation,
};
use crate::seller::Seller;

/// Filter for listing operations. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub status: Option<OperationStatus>,
    pub seller: Option<Seller>,
    pub kind: Option<OperationKind>,
    /// Case-insensitive regex over the category field.
    pub category: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Free-text search over url, category, and notes.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort specification; columns are whitelisted by implementations.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub sort_by: String,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            sort_by: "created_at".to_string(),
            order: SortOrder::Desc,
        }
    }
}

/// 1-based pagination.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of operations plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct OperationPage {
    pub items: Vec<ScrapeOperation>,
    pub total: u64,
}

/// Operation counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub success: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.success + self.failed + self.cancelled
    }
}

/// Per-seller outcome totals with a derived success rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerStats {
    pub seller: Seller,
    pub total: i64,
    pub success: i64,
    pub failed: i64,
    pub active: i64,
    /// `success/total*100`, rounded to 2 decimals; 0 when total is 0.
    pub success_rate: f64,
}

/// Round a success ratio to a 2-decimal percentage.
pub fn success_rate(success: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        ((success as f64 / total as f64) * 100.0 * 100.0).round() / 100.0
    }
}

/// Durable store of scraping operations.
///
/// Lifecycle methods apply the pure transitions in
/// [`crate::operation::lifecycle`] and persist the result under an
/// optimistic status guard, so a violated precondition surfaces as
/// `InvalidTransition` rather than silently coercing state.
pub trait OperationStore: Send + Sync + Clone {
    /// Create a new `pending` operation.
    ///
    /// Rejects with `Conflict` if a non-terminal operation already
    /// exists for the same URL (checked query-then-insert; the narrow
    /// race window is a documented limitation).
    fn create(
        &self,
        request: CreateOperationRequest,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    fn get(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapeOperation>, ScrapeError>> + Send;

    fn list(
        &self,
        filter: &OperationFilter,
        sort: &SortSpec,
        page: &PageRequest,
    ) -> impl Future<Output = Result<OperationPage, ScrapeError>> + Send;

    fn delete(&self, id: Uuid) -> impl Future<Output = Result<(), ScrapeError>> + Send;

    // -- lifecycle -----------------------------------------------------

    fn mark_started(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    fn mark_completed(
        &self,
        id: Uuid,
        outcome: CompletedOutcome,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    fn mark_failed(
        &self,
        id: Uuid,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    fn mark_cancelled(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    fn increment_retry(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<ScrapeOperation, ScrapeError>> + Send;

    // -- worklists -----------------------------------------------------

    /// All `pending` operations, oldest `attempt_time` first.
    fn pending_ready(
        &self,
    ) -> impl Future<Output = Result<Vec<ScrapeOperation>, ScrapeError>> + Send;

    /// All `failed` operations with retries remaining.
    fn failed_retryable(
        &self,
    ) -> impl Future<Output = Result<Vec<ScrapeOperation>, ScrapeError>> + Send;

    /// Terminal (`success`/`failed`) operations that settled before `cutoff`.
    fn terminal_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ScrapeOperation>, ScrapeError>> + Send;

    // -- aggregations --------------------------------------------------

    fn count_by_status(
        &self,
        status: OperationStatus,
    ) -> impl Future<Output = Result<i64, ScrapeError>> + Send;

    fn status_counts(&self) -> impl Future<Output = Result<StatusCounts, ScrapeError>> + Send;

    fn seller_stats(&self) -> impl Future<Output = Result<Vec<SellerStats>, ScrapeError>> + Send;

    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScrapeOperation>, ScrapeError>> + Send;
}
