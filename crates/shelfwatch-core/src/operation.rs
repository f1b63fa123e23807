use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScrapeError;
use crate::seller::Seller;

/// Status of a scraping operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub const ALL: [OperationStatus; 5] = [
        OperationStatus::Pending,
        OperationStatus::InProgress,
        OperationStatus::Success,
        OperationStatus::Failed,
        OperationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Success => "success",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal at the *status* level. A `failed` operation is still
    /// retryable here; whether its retries are exhausted is a property
    /// of the operation (see [`ScrapeOperation::is_terminal`]).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success | OperationStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::InProgress)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OperationStatus::Pending),
            "in_progress" => Ok(OperationStatus::InProgress),
            "success" => Ok(OperationStatus::Success),
            "failed" => Ok(OperationStatus::Failed),
            "cancelled" => Ok(OperationStatus::Cancelled),
            _ => Err(format!("Unknown operation status: {}", s)),
        }
    }
}

/// What kind of page the operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Product,
    Category,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Product => "product",
            OperationKind::Category => "category",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "product" => Ok(OperationKind::Product),
            "category" => Ok(OperationKind::Category),
            _ => Err(format!("Unknown operation kind: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Scraping progress counters plus the derived percentage.
///
/// The percentage is computed once, at construction, not recomputed by
/// the persistence layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    pub percentage: u32,
}

impl Progress {
    /// The percentage rule: `round(current/total*100)`, 0 when total is 0.
    pub fn ratio(current: u32, total: u32) -> u32 {
        if total == 0 {
            0
        } else {
            ((current as f64 / total as f64) * 100.0).round() as u32
        }
    }

    pub fn new(current: u32, total: u32) -> Self {
        Self {
            current,
            total,
            percentage: Self::ratio(current, total),
        }
    }

    /// The completion form `{total, total, 100}`. Used by `complete` so
    /// a finished operation always reads 100%, including the
    /// zero-product edge case.
    pub fn completed(total: u32) -> Self {
        Self {
            current: total,
            total,
            percentage: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-operation fetch configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 5_000;
pub const MAX_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_WAIT_TIME_MS: u64 = 3_000;
pub const MIN_WAIT_TIME_MS: u64 = 1_000;
pub const MAX_WAIT_TIME_MS: u64 = 10_000;

/// How an operation's page should be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Render the page in a headless browser instead of a plain GET.
    pub use_browser: bool,
    /// Overall fetch timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra settle time after render, for client-side content.
    pub wait_time_ms: u64,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            use_browser: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            wait_time_ms: DEFAULT_WAIT_TIME_MS,
        }
    }
}

impl OperationConfig {
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ScrapeError::Validation(format!(
                "timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}, got {}",
                self.timeout_ms
            )));
        }
        if !(MIN_WAIT_TIME_MS..=MAX_WAIT_TIME_MS).contains(&self.wait_time_ms) {
            return Err(ScrapeError::Validation(format!(
                "wait_time_ms must be between {MIN_WAIT_TIME_MS} and {MAX_WAIT_TIME_MS}, got {}",
                self.wait_time_ms
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }
}

// ---------------------------------------------------------------------------
// ScrapeOperation
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One unit of scraping work, with its full lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOperation {
    pub id: Uuid,
    pub url: String,
    pub seller: Seller,
    pub kind: OperationKind,
    pub status: OperationStatus,

    /// When the operation was queued or re-queued for processing.
    pub attempt_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub total_products: u32,
    pub scraped_products: u32,
    pub failed_products: u32,
    pub progress: Progress,

    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub retry_count: u32,
    pub max_retries: u32,

    pub config: OperationConfig,

    pub scraped_data: Option<serde_json::Value>,
    /// Path to the externally persisted result file, when one was written.
    pub data_file: Option<String>,

    pub category: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeOperation {
    /// Wall-clock duration, available once both timestamps are set.
    pub fn duration(&self) -> Option<TimeDelta> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.status == OperationStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Terminal at the *operation* level: success, cancelled, or failed
    /// with retries exhausted.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
            || (self.status == OperationStatus::Failed && self.retry_count >= self.max_retries)
    }
}

/// Request to create a new scraping operation.
#[derive(Debug, Clone)]
pub struct CreateOperationRequest {
    pub url: String,
    pub seller: Seller,
    pub kind: OperationKind,
    pub config: OperationConfig,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub max_retries: Option<u32>,
}

impl CreateOperationRequest {
    pub fn new(url: impl Into<String>, seller: Seller, kind: OperationKind) -> Self {
        Self {
            url: url.into(),
            seller,
            kind,
            config: OperationConfig::default(),
            category: None,
            notes: None,
            tags: Vec::new(),
            ip_address: None,
            user_agent: None,
            max_retries: None,
        }
    }

    pub fn with_config(mut self, config: OperationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ScrapeError::Validation(format!("Invalid URL '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::Validation(format!(
                "URL scheme '{}' is not allowed (only http/https)",
                parsed.scheme()
            )));
        }
        self.config.validate()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

/// Result payload of a successful execution, applied by [`lifecycle::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompletedOutcome {
    pub total_products: u32,
    pub scraped_products: u32,
    pub failed_products: u32,
    pub scraped_data: Option<serde_json::Value>,
    pub data_file: Option<String>,
}

/// Pure state-machine transitions.
///
/// Each function consumes the operation and returns the updated one, or
/// an `InvalidTransition` error when the precondition doesn't hold.
/// Derived fields (progress, timestamps) are computed here, once, at the
/// transition — store implementations persist the result and guard the
/// precondition optimistically.
pub mod lifecycle {
    use super::*;

    pub fn start(
        mut op: ScrapeOperation,
        now: DateTime<Utc>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        if op.status != OperationStatus::Pending {
            return Err(ScrapeError::InvalidTransition(format!(
                "cannot start operation {} from status '{}'",
                op.id, op.status
            )));
        }
        op.status = OperationStatus::InProgress;
        op.started_at = Some(now);
        op.updated_at = now;
        Ok(op)
    }

    pub fn complete(
        mut op: ScrapeOperation,
        outcome: CompletedOutcome,
        now: DateTime<Utc>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        if op.status != OperationStatus::InProgress {
            return Err(ScrapeError::InvalidTransition(format!(
                "cannot complete operation {} from status '{}'",
                op.id, op.status
            )));
        }
        op.status = OperationStatus::Success;
        op.finished_at = Some(now);
        op.total_products = outcome.total_products;
        op.scraped_products = outcome.scraped_products;
        op.failed_products = outcome.failed_products;
        op.progress = Progress::completed(outcome.total_products);
        op.scraped_data = outcome.scraped_data;
        op.data_file = outcome.data_file;
        op.error_message = None;
        op.error_details = None;
        op.updated_at = now;
        Ok(op)
    }

    /// Always permitted from any non-terminal status — the universal
    /// escape hatch for unexpected faults.
    pub fn fail(
        mut op: ScrapeOperation,
        message: &str,
        details: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        if op.status.is_terminal() {
            return Err(ScrapeError::InvalidTransition(format!(
                "cannot fail operation {} from terminal status '{}'",
                op.id, op.status
            )));
        }
        op.status = OperationStatus::Failed;
        op.finished_at = Some(now);
        op.error_message = Some(message.to_string());
        op.error_details = details;
        op.updated_at = now;
        Ok(op)
    }

    pub fn retry(
        mut op: ScrapeOperation,
        now: DateTime<Utc>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        if op.status != OperationStatus::Failed {
            return Err(ScrapeError::InvalidTransition(format!(
                "cannot retry operation {} from status '{}'",
                op.id, op.status
            )));
        }
        if op.retry_count >= op.max_retries {
            return Err(ScrapeError::InvalidTransition(format!(
                "operation {} exhausted its {} retries",
                op.id, op.max_retries
            )));
        }
        op.status = OperationStatus::Pending;
        op.attempt_time = now;
        op.retry_count += 1;
        op.started_at = None;
        op.finished_at = None;
        op.updated_at = now;
        Ok(op)
    }

    /// Administrative end-state, set out-of-band by an operator.
    pub fn cancel(
        mut op: ScrapeOperation,
        now: DateTime<Utc>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        if op.status.is_terminal() {
            return Err(ScrapeError::InvalidTransition(format!(
                "cannot cancel operation {} from terminal status '{}'",
                op.id, op.status
            )));
        }
        op.status = OperationStatus::Cancelled;
        op.finished_at = Some(now);
        op.updated_at = now;
        Ok(op)
    }
}

// ---------------------------------------------------------------------------
// Processor configuration
// ---------------------------------------------------------------------------

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_CHUNK_SIZE: usize = 3;
pub const DEFAULT_LINK_PACING: Duration = Duration::from_millis(2_000);

/// Configuration for the background job processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub poll_interval: Duration,
    /// Concurrency limit: operations per chunk within a processing pass.
    pub chunk_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ProcessorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}
