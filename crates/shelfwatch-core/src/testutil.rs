//! Test utilities: in-memory implementations of the core traits.
//!
//! Handwritten fakes for dependency injection in unit tests. All of
//! them use `Arc<Mutex<_>>` interior mutability so cloned handles share
//! state and tests can assert on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::adapter::SiteAdapter;
use crate::error::ScrapeError;
use crate::log::{
    DailyLogCount, LogFilter, LogPage, LogStats, LogStore, NewLogEntry, ScrapeLogEntry,
};
use crate::operation::{
    CompletedOutcome, CreateOperationRequest, DEFAULT_MAX_RETRIES, OperationConfig, OperationKind,
    OperationStatus, Progress, ScrapeOperation, lifecycle,
};
use crate::product::{CategoryPage, ProductRecord};
use crate::results::{ResultStore, result_file_name};
use crate::seller::Seller;
use crate::store::{
    OperationFilter, OperationPage, OperationStore, PageRequest, SellerStats, SortOrder, SortSpec,
    StatusCounts, success_rate,
};
use crate::traits::{FetchConfig, Fetcher};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

type FetchHandler = dyn Fn(&str) -> Result<String, ScrapeError> + Send + Sync;

/// Tracks how many fetches are in flight and the highest watermark seen.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_seen(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Mock fetcher driven by a URL-keyed handler closure.
#[derive(Clone)]
pub struct MockFetcher {
    handler: Arc<FetchHandler>,
    delay: Duration,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub gauge: Arc<ConcurrencyGauge>,
}

impl MockFetcher {
    /// Returns the same body for every URL.
    pub fn always(body: &str) -> Self {
        let body = body.to_string();
        Self::with_responses(move |_| Ok(body.clone()))
    }

    /// Fails every fetch with the produced error.
    pub fn failing<E>(make_error: E) -> Self
    where
        E: Fn() -> ScrapeError + Send + Sync + 'static,
    {
        Self::with_responses(move |_| Err(make_error()))
    }

    /// Full control: the handler decides per URL.
    pub fn with_responses<H>(handler: H) -> Self
    where
        H: Fn(&str) -> Result<String, ScrapeError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            gauge: Arc::new(ConcurrencyGauge::default()),
        }
    }

    /// Hold each fetch open for `delay`, so tests can observe overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _config: &FetchConfig) -> Result<String, ScrapeError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.gauge.enter();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.handler)(url);
        self.gauge.exit();
        result
    }
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

/// Adapter returning a fixed product (and optionally a fixed category page).
pub struct FixedAdapter {
    title: String,
    category: Option<CategoryPage>,
}

impl FixedAdapter {
    pub fn product(title: &str) -> Self {
        Self {
            title: title.to_string(),
            category: None,
        }
    }

    pub fn with_category(title: &str, page: CategoryPage) -> Self {
        Self {
            title: title.to_string(),
            category: Some(page),
        }
    }
}

impl SiteAdapter for FixedAdapter {
    fn scrape_product(&self, _content: &str) -> Result<ProductRecord, ScrapeError> {
        Ok(ProductRecord::new(self.title.clone()))
    }

    fn supports_category(&self) -> bool {
        self.category.is_some()
    }

    fn scrape_category(&self, _content: &str) -> Result<CategoryPage, ScrapeError> {
        self.category.clone().ok_or_else(|| {
            ScrapeError::Extraction("adapter does not support category extraction".to_string())
        })
    }
}

/// Adapter whose extraction always fails.
pub struct FailingAdapter {
    message: String,
}

impl FailingAdapter {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl SiteAdapter for FailingAdapter {
    fn scrape_product(&self, _content: &str) -> Result<ProductRecord, ScrapeError> {
        Err(ScrapeError::Extraction(self.message.clone()))
    }
}

// ---------------------------------------------------------------------------
// MemoryOperationStore
// ---------------------------------------------------------------------------

/// In-memory [`OperationStore`] backed by a `Vec`, applying the same
/// pure lifecycle transitions the real repository persists.
#[derive(Clone, Default)]
pub struct MemoryOperationStore {
    ops: Arc<Mutex<Vec<ScrapeOperation>>>,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a prebuilt operation.
    pub fn insert(&self, op: ScrapeOperation) {
        self.ops.lock().unwrap().push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transition<T>(&self, id: Uuid, apply: T) -> Result<ScrapeOperation, ScrapeError>
    where
        T: FnOnce(ScrapeOperation) -> Result<ScrapeOperation, ScrapeError>,
    {
        let mut ops = self.ops.lock().unwrap();
        let pos = ops
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| ScrapeError::NotFound(format!("operation {id}")))?;
        let updated = apply(ops[pos].clone())?;
        ops[pos] = updated.clone();
        Ok(updated)
    }
}

impl OperationStore for MemoryOperationStore {
    async fn create(
        &self,
        request: CreateOperationRequest,
    ) -> Result<ScrapeOperation, ScrapeError> {
        let mut ops = self.ops.lock().unwrap();
        if ops.iter().any(|op| op.url == request.url && op.is_active()) {
            return Err(ScrapeError::Conflict(format!(
                "an active operation already exists for URL {}",
                request.url
            )));
        }
        let now = Utc::now();
        let op = ScrapeOperation {
            id: Uuid::new_v4(),
            url: request.url,
            seller: request.seller,
            kind: request.kind,
            status: OperationStatus::Pending,
            attempt_time: now,
            started_at: None,
            finished_at: None,
            total_products: 0,
            scraped_products: 0,
            failed_products: 0,
            progress: Progress::default(),
            error_message: None,
            error_details: None,
            retry_count: 0,
            max_retries: request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            config: request.config,
            scraped_data: None,
            data_file: None,
            category: request.category,
            notes: request.notes,
            tags: request.tags,
            ip_address: request.ip_address,
            user_agent: request.user_agent,
            created_at: now,
            updated_at: now,
        };
        ops.push(op.clone());
        Ok(op)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScrapeOperation>, ScrapeError> {
        Ok(self.ops.lock().unwrap().iter().find(|op| op.id == id).cloned())
    }

    async fn list(
        &self,
        filter: &OperationFilter,
        sort: &SortSpec,
        page: &PageRequest,
    ) -> Result<OperationPage, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        let mut matched: Vec<ScrapeOperation> = ops
            .iter()
            .filter(|op| {
                filter.status.is_none_or(|s| op.status == s)
                    && filter.seller.is_none_or(|s| op.seller == s)
                    && filter.kind.is_none_or(|k| op.kind == k)
                    && filter.category.as_ref().is_none_or(|needle| {
                        op.category
                            .as_ref()
                            .is_some_and(|c| c.to_lowercase().contains(&needle.to_lowercase()))
                    })
                    && filter.created_after.is_none_or(|t| op.created_at >= t)
                    && filter.created_before.is_none_or(|t| op.created_at <= t)
                    && filter.search.as_ref().is_none_or(|needle| {
                        let needle = needle.to_lowercase();
                        op.url.to_lowercase().contains(&needle)
                            || op
                                .category
                                .as_ref()
                                .is_some_and(|c| c.to_lowercase().contains(&needle))
                            || op
                                .notes
                                .as_ref()
                                .is_some_and(|n| n.to_lowercase().contains(&needle))
                    })
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match sort.sort_by.as_str() {
                "attempt_time" => a.attempt_time.cmp(&b.attempt_time),
                "updated_at" => a.updated_at.cmp(&b.updated_at),
                _ => a.created_at.cmp(&b.created_at),
            };
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(OperationPage { items, total })
    }

    async fn delete(&self, id: Uuid) -> Result<(), ScrapeError> {
        let mut ops = self.ops.lock().unwrap();
        let before = ops.len();
        ops.retain(|op| op.id != id);
        if ops.len() == before {
            return Err(ScrapeError::NotFound(format!("operation {id}")));
        }
        Ok(())
    }

    async fn mark_started(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::start(op, Utc::now()))
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        outcome: CompletedOutcome,
    ) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::complete(op, outcome, Utc::now()))
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::fail(op, message, details, Utc::now()))
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::cancel(op, Utc::now()))
    }

    async fn increment_retry(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.transition(id, |op| lifecycle::retry(op, Utc::now()))
    }

    async fn pending_ready(&self) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        let mut pending: Vec<ScrapeOperation> = ops
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|op| op.attempt_time);
        Ok(pending)
    }

    async fn failed_retryable(&self) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        Ok(ops.iter().filter(|op| op.can_retry()).cloned().collect())
    }

    async fn terminal_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        Ok(ops
            .iter()
            .filter(|op| {
                matches!(
                    op.status,
                    OperationStatus::Success | OperationStatus::Failed
                ) && op.finished_at.unwrap_or(op.updated_at) < cutoff
            })
            .cloned()
            .collect())
    }

    async fn count_by_status(&self, status: OperationStatus) -> Result<i64, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        Ok(ops.iter().filter(|op| op.status == status).count() as i64)
    }

    async fn status_counts(&self) -> Result<StatusCounts, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        let mut counts = StatusCounts::default();
        for op in ops.iter() {
            match op.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::InProgress => counts.in_progress += 1,
                OperationStatus::Success => counts.success += 1,
                OperationStatus::Failed => counts.failed += 1,
                OperationStatus::Cancelled => counts.cancelled += 1,
            }
        }
        Ok(counts)
    }

    async fn seller_stats(&self) -> Result<Vec<SellerStats>, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        let mut by_seller: HashMap<Seller, (i64, i64, i64, i64)> = HashMap::new();
        for op in ops.iter() {
            let entry = by_seller.entry(op.seller).or_default();
            entry.0 += 1;
            match op.status {
                OperationStatus::Success => entry.1 += 1,
                OperationStatus::Failed => entry.2 += 1,
                OperationStatus::Pending | OperationStatus::InProgress => entry.3 += 1,
                OperationStatus::Cancelled => {}
            }
        }
        let mut stats: Vec<SellerStats> = by_seller
            .into_iter()
            .map(|(seller, (total, success, failed, active))| SellerStats {
                seller,
                total,
                success,
                failed,
                active,
                success_rate: success_rate(success, total),
            })
            .collect();
        stats.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(stats)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ScrapeOperation>, ScrapeError> {
        let ops = self.ops.lock().unwrap();
        let mut all: Vec<ScrapeOperation> = ops.iter().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// MemoryLogStore
// ---------------------------------------------------------------------------

/// In-memory [`LogStore`]. The `broken` variant fails every call, for
/// asserting the best-effort boundary.
#[derive(Clone, Default)]
pub struct MemoryLogStore {
    entries: Arc<Mutex<Vec<ScrapeLogEntry>>>,
    broken: bool,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log store whose every call fails with a persistence error.
    pub fn broken() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            broken: true,
        }
    }

    pub fn entries(&self) -> Vec<ScrapeLogEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), ScrapeError> {
        if self.broken {
            Err(ScrapeError::Persistence("log store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LogStore for MemoryLogStore {
    async fn append(&self, entry: NewLogEntry) -> Result<ScrapeLogEntry, ScrapeError> {
        self.check()?;
        let created = ScrapeLogEntry {
            id: Uuid::new_v4(),
            logged_at: entry.logged_at.unwrap_or_else(Utc::now),
            platform: entry.platform,
            kind: entry.kind,
            url: entry.url,
            category: entry.category,
            status: entry.status,
            action: entry.action,
            operation_id: entry.operation_id,
        };
        self.entries.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn advance(
        &self,
        operation_id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> Result<Option<ScrapeLogEntry>, ScrapeError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let latest = entries
            .iter_mut()
            .filter(|e| e.operation_id == Some(operation_id))
            .max_by_key(|e| e.logged_at);
        match latest {
            Some(entry) => {
                entry.status = status;
                entry.action = action.to_string();
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_entry(
        &self,
        id: Uuid,
        status: OperationStatus,
        action: &str,
    ) -> Result<Option<ScrapeLogEntry>, ScrapeError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.status = status;
                entry.action = action.to_string();
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &LogFilter, page: &PageRequest) -> Result<LogPage, ScrapeError> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        let mut matched: Vec<ScrapeLogEntry> = entries
            .iter()
            .filter(|e| {
                filter.platform.as_ref().is_none_or(|p| &e.platform == p)
                    && filter.status.is_none_or(|s| e.status == s)
                    && filter.kind.is_none_or(|k| e.kind == k)
                    && filter.logged_after.is_none_or(|t| e.logged_at >= t)
                    && filter.logged_before.is_none_or(|t| e.logged_at <= t)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(LogPage { items, total })
    }

    async fn stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<LogStats, ScrapeError> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        let mut stats = LogStats::default();
        let mut daily: HashMap<(chrono::NaiveDate, OperationStatus), i64> = HashMap::new();
        for e in entries.iter() {
            if from.is_some_and(|t| e.logged_at < t) || to.is_some_and(|t| e.logged_at > t) {
                continue;
            }
            match e.status {
                OperationStatus::Pending => stats.pending += 1,
                OperationStatus::InProgress => stats.in_progress += 1,
                OperationStatus::Success => stats.success += 1,
                OperationStatus::Failed => stats.failed += 1,
                OperationStatus::Cancelled => stats.cancelled += 1,
            }
            *daily.entry((e.logged_at.date_naive(), e.status)).or_default() += 1;
        }
        let mut series: Vec<DailyLogCount> = daily
            .into_iter()
            .map(|((day, status), count)| DailyLogCount { day, status, count })
            .collect();
        series.sort_by(|a, b| (a.day, a.status.as_str()).cmp(&(b.day, b.status.as_str())));
        stats.daily = series;
        Ok(stats.finalise())
    }
}

// ---------------------------------------------------------------------------
// MemoryResultStore
// ---------------------------------------------------------------------------

/// In-memory [`ResultStore`] recording writes and removals.
#[derive(Clone, Default)]
pub struct MemoryResultStore {
    files: Arc<Mutex<HashMap<String, serde_json::Value>>>,
    pub removed: Arc<Mutex<Vec<String>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

impl ResultStore for MemoryResultStore {
    async fn write(
        &self,
        seller: Seller,
        kind: OperationKind,
        data: &serde_json::Value,
    ) -> Result<String, ScrapeError> {
        let path = format!("results/{}", result_file_name(seller, kind, Utc::now()));
        self.files.lock().unwrap().insert(path.clone(), data.clone());
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<serde_json::Value, ScrapeError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ScrapeError::NotFound(format!("result file not found: {path}")))
    }

    async fn remove(&self, path: &str) -> Result<(), ScrapeError> {
        self.removed.lock().unwrap().push(path.to_string());
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ScrapeError::NotFound(format!("result file not found: {path}")))
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A pending flipkart product operation with default config.
pub fn make_test_operation() -> ScrapeOperation {
    let now = Utc::now();
    ScrapeOperation {
        id: Uuid::new_v4(),
        url: "https://www.flipkart.com/widget/p/itm123".to_string(),
        seller: Seller::Flipkart,
        kind: OperationKind::Product,
        status: OperationStatus::Pending,
        attempt_time: now,
        started_at: None,
        finished_at: None,
        total_products: 0,
        scraped_products: 0,
        failed_products: 0,
        progress: Progress::default(),
        error_message: None,
        error_details: None,
        retry_count: 0,
        max_retries: DEFAULT_MAX_RETRIES,
        config: OperationConfig::default(),
        scraped_data: None,
        data_file: None,
        category: None,
        notes: None,
        tags: Vec::new(),
        ip_address: None,
        user_agent: None,
        created_at: now,
        updated_at: now,
    }
}
