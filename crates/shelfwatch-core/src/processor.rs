use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::ScrapeEngine;
use crate::error::ScrapeError;
use crate::log::LogStore;
use crate::operation::{MIN_POLL_INTERVAL, ProcessorConfig, ScrapeOperation};
use crate::results::ResultStore;
use crate::store::{OperationStore, SellerStats, StatusCounts};
use crate::traits::Fetcher;

/// Events emitted by the processor for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ProcessorEvent<'a> {
    Started { interval: Duration },
    Stopped,
    PassStarted { pending: usize },
    PassCompleted { processed: usize, succeeded: usize, failed: usize },
    PassErrored { error: &'a str },
    OperationFailed { id: Uuid, error: &'a str },
    RetryPassCompleted { attempted: usize, failed: usize },
    CleanupCompleted { deleted: usize },
}

/// Trait for receiving processor events (decoupled logging).
pub trait ProcessorReporter: Send + Sync {
    fn report(&self, event: ProcessorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProcessorReporter;

impl ProcessorReporter for TracingProcessorReporter {
    fn report(&self, event: ProcessorEvent<'_>) {
        match event {
            ProcessorEvent::Started { interval } => {
                tracing::info!(interval_ms = interval.as_millis() as u64, "Processor started");
            }
            ProcessorEvent::Stopped => {
                tracing::info!("Processor stopped");
            }
            ProcessorEvent::PassStarted { pending } => {
                tracing::debug!(%pending, "Processing pass started");
            }
            ProcessorEvent::PassCompleted { processed, succeeded, failed } => {
                tracing::info!(%processed, %succeeded, %failed, "Processing pass completed");
            }
            ProcessorEvent::PassErrored { error } => {
                tracing::error!(%error, "Processing pass errored");
            }
            ProcessorEvent::OperationFailed { id, error } => {
                tracing::warn!(operation_id = %id, %error, "Operation failed during pass");
            }
            ProcessorEvent::RetryPassCompleted { attempted, failed } => {
                tracing::info!(%attempted, %failed, "Retry pass completed");
            }
            ProcessorEvent::CleanupCompleted { deleted } => {
                tracing::info!(%deleted, "Cleanup completed");
            }
        }
    }
}

/// Outcome of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Per-operation outcome of a retry pass.
#[derive(Debug, Clone, Serialize)]
pub struct RetryOutcome {
    pub id: Uuid,
    /// `None` on success, the error message otherwise.
    pub error: Option<String>,
}

/// Live processor and store snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorStatus {
    pub running: bool,
    pub interval_ms: u64,
    pub pending: i64,
    pub in_progress: i64,
    pub counts: StatusCounts,
    pub sellers: Vec<SellerStats>,
    pub recent: Vec<ScrapeOperation>,
}

struct ProcessorInner {
    running: bool,
    interval: Duration,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Background loop that drives pending operations through the engine,
/// plus the manual controls around it (trigger, retry, cleanup).
///
/// Concurrency is bounded per pass: pending operations (oldest
/// `attempt_time` first) are split into fixed-size chunks, and a chunk
/// is only started once the previous one has fully settled. Per-chunk
/// size is therefore the ceiling on simultaneous fetch/render sessions.
pub struct JobProcessor<F, S, L, R>
where
    F: Fetcher,
    S: OperationStore,
    L: LogStore,
    R: ResultStore,
{
    engine: ScrapeEngine<F, S, L, R>,
    store: S,
    results: R,
    chunk_size: usize,
    reporter: Arc<dyn ProcessorReporter>,
    inner: Arc<Mutex<ProcessorInner>>,
}

impl<F, S, L, R> Clone for JobProcessor<F, S, L, R>
where
    F: Fetcher,
    S: OperationStore,
    L: LogStore,
    R: ResultStore,
{
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            store: self.store.clone(),
            results: self.results.clone(),
            chunk_size: self.chunk_size,
            reporter: self.reporter.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<F, S, L, R> JobProcessor<F, S, L, R>
where
    F: Fetcher + 'static,
    S: OperationStore + 'static,
    L: LogStore + 'static,
    R: ResultStore + 'static,
{
    pub fn new(engine: ScrapeEngine<F, S, L, R>, results: R, config: ProcessorConfig) -> Self {
        Self::with_reporter(engine, results, config, Arc::new(TracingProcessorReporter))
    }

    pub fn with_reporter(
        engine: ScrapeEngine<F, S, L, R>,
        results: R,
        config: ProcessorConfig,
        reporter: Arc<dyn ProcessorReporter>,
    ) -> Self {
        let store = engine.store().clone();
        Self {
            engine,
            store,
            results,
            chunk_size: config.chunk_size.max(1),
            reporter,
            inner: Arc::new(Mutex::new(ProcessorInner {
                running: false,
                interval: config.poll_interval.max(MIN_POLL_INTERVAL),
                cancel: None,
                handle: None,
            })),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn interval(&self) -> Duration {
        self.inner.lock().unwrap().interval
    }

    /// Start the polling loop: one immediate pass, then a pass every
    /// interval. No-op if already running; returns whether it started.
    pub fn start(&self) -> bool {
        let token = {
            let mut inner = self.inner.lock().unwrap();
            if inner.running {
                return false;
            }
            let token = CancellationToken::new();
            inner.running = true;
            inner.cancel = Some(token.clone());
            self.reporter.report(ProcessorEvent::Started { interval: inner.interval });
            token
        };

        let processor = self.clone();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                if loop_token.is_cancelled() {
                    break;
                }
                if let Err(e) = processor.run_pass().await {
                    // A faulty pass must not halt future polling.
                    processor
                        .reporter
                        .report(ProcessorEvent::PassErrored { error: &e.to_string() });
                }
                let interval = processor.interval();
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = loop_token.cancelled() => break,
                }
            }
        });

        self.inner.lock().unwrap().handle = Some(handle);
        true
    }

    /// Stop the polling loop, letting an in-flight pass settle first.
    /// Idempotent.
    pub async fn stop(&self) {
        let (token, handle) = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running {
                return;
            }
            inner.running = false;
            (inner.cancel.take(), inner.handle.take())
        };
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.reporter.report(ProcessorEvent::Stopped);
    }

    /// Change the polling interval. Rejects intervals under 1000 ms.
    /// Takes effect from the next scheduled pass.
    pub fn set_interval(&self, interval: Duration) -> Result<(), ScrapeError> {
        if interval < MIN_POLL_INTERVAL {
            return Err(ScrapeError::Validation(format!(
                "poll interval must be at least {} ms, got {} ms",
                MIN_POLL_INTERVAL.as_millis(),
                interval.as_millis()
            )));
        }
        self.inner.lock().unwrap().interval = interval;
        Ok(())
    }

    /// Run one pass immediately, outside the schedule. Fails unless the
    /// processor has been started.
    pub async fn trigger(&self) -> Result<PassSummary, ScrapeError> {
        if !self.is_running() {
            return Err(ScrapeError::InvalidTransition(
                "processor is not running".to_string(),
            ));
        }
        self.run_pass().await
    }

    /// One processing pass: claim all pending operations oldest-first,
    /// execute them chunk by chunk. A single operation's failure is
    /// recorded and never aborts the pass.
    pub async fn run_pass(&self) -> Result<PassSummary, ScrapeError> {
        let pending = self.store.pending_ready().await?;
        self.reporter.report(ProcessorEvent::PassStarted { pending: pending.len() });

        let mut summary = PassSummary::default();
        for chunk in pending.chunks(self.chunk_size) {
            let results = futures::future::join_all(chunk.iter().map(|op| {
                let engine = self.engine.clone();
                let id = op.id;
                async move { (id, engine.execute_operation(id).await) }
            }))
            .await;

            for (id, result) in results {
                summary.processed += 1;
                match result {
                    Ok(_) => summary.succeeded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        self.reporter
                            .report(ProcessorEvent::OperationFailed { id, error: &e.to_string() });
                    }
                }
            }
        }

        self.reporter.report(ProcessorEvent::PassCompleted {
            processed: summary.processed,
            succeeded: summary.succeeded,
            failed: summary.failed,
        });
        Ok(summary)
    }

    /// Re-queue and execute every failed operation that still has
    /// retries left, concurrently. Individual outcomes are collected;
    /// one rejection never aborts the batch.
    pub async fn retry_failed(&self) -> Result<Vec<RetryOutcome>, ScrapeError> {
        let retryable = self.store.failed_retryable().await?;

        let outcomes = futures::future::join_all(retryable.iter().map(|op| {
            let engine = self.engine.clone();
            let store = self.store.clone();
            let id = op.id;
            async move {
                let result = match store.increment_retry(id).await {
                    Ok(_) => engine.execute_operation(id).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                RetryOutcome { id, error: result.err().map(|e| e.to_string()) }
            }
        }))
        .await;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        self.reporter.report(ProcessorEvent::RetryPassCompleted {
            attempted: outcomes.len(),
            failed,
        });
        Ok(outcomes)
    }

    /// Delete terminal operations older than `days_old` days, removing
    /// their result files first (best-effort; a missing file is fine).
    /// Returns the ids actually deleted; individual failures are
    /// skipped, not fatal to the batch.
    pub async fn cleanup_old(&self, days_old: u32) -> Result<Vec<Uuid>, ScrapeError> {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days_old));
        let expired = self.store.terminal_older_than(cutoff).await?;

        let mut deleted = Vec::new();
        for op in expired {
            if let Some(file) = &op.data_file {
                match self.results.remove(file).await {
                    Ok(()) | Err(ScrapeError::NotFound(_)) => {}
                    Err(e) => {
                        tracing::warn!(
                            operation_id = %op.id,
                            file = %file,
                            error = %e,
                            "Failed to remove result file during cleanup"
                        );
                    }
                }
            }
            match self.store.delete(op.id).await {
                Ok(()) => deleted.push(op.id),
                Err(e) => {
                    tracing::warn!(operation_id = %op.id, error = %e, "Cleanup skipped operation");
                }
            }
        }

        self.reporter.report(ProcessorEvent::CleanupCompleted { deleted: deleted.len() });
        Ok(deleted)
    }

    /// Running flag, interval, live queue depths, and store aggregates.
    pub async fn status(&self) -> Result<ProcessorStatus, ScrapeError> {
        let (running, interval) = {
            let inner = self.inner.lock().unwrap();
            (inner.running, inner.interval)
        };
        let counts = self.store.status_counts().await?;
        let sellers = self.store.seller_stats().await?;
        let recent = self.store.recent(10).await?;
        Ok(ProcessorStatus {
            running,
            interval_ms: interval.as_millis() as u64,
            pending: counts.pending,
            in_progress: counts.in_progress,
            counts,
            sellers,
            recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapter::AdapterRegistry;
    use crate::operation::{CreateOperationRequest, OperationKind, OperationStatus};
    use crate::seller::Seller;
    use crate::testutil::{
        FixedAdapter, MemoryLogStore, MemoryOperationStore, MemoryResultStore, MockFetcher,
        make_test_operation,
    };

    type TestProcessor =
        JobProcessor<MockFetcher, MemoryOperationStore, MemoryLogStore, MemoryResultStore>;

    fn build_processor(fetcher: MockFetcher, config: ProcessorConfig) -> TestProcessor {
        let mut registry = AdapterRegistry::new();
        registry.register_instance(Seller::Flipkart, Arc::new(FixedAdapter::product("Widget")));
        let results = MemoryResultStore::new();
        let engine = ScrapeEngine::new(
            fetcher,
            MemoryOperationStore::new(),
            MemoryLogStore::new(),
            results.clone(),
            Arc::new(registry),
        )
        .with_link_pacing(Duration::ZERO);
        JobProcessor::new(engine, results, config)
    }

    async fn submit_n(processor: &TestProcessor, n: usize, seller: Seller) {
        for i in 0..n {
            processor
                .store
                .create(CreateOperationRequest::new(
                    format!("https://www.flipkart.com/w{i}/p/itm{i}?s={seller}"),
                    seller,
                    OperationKind::Product,
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_graceful() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        assert!(!processor.is_running());
        assert!(processor.start());
        assert!(!processor.start());
        assert!(processor.is_running());

        processor.stop().await;
        assert!(!processor.is_running());
        // Idempotent.
        processor.stop().await;
    }

    #[tokio::test]
    async fn started_processor_drains_pending_operations() {
        let processor = build_processor(
            MockFetcher::always("<html></html>"),
            ProcessorConfig::default().with_poll_interval(Duration::from_millis(1_000)),
        );
        submit_n(&processor, 2, Seller::Flipkart).await;

        processor.start();
        // The immediate pass should pick both up shortly.
        for _ in 0..50 {
            if processor.store.count_by_status(OperationStatus::Success).await.unwrap() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        processor.stop().await;

        assert_eq!(
            processor.store.count_by_status(OperationStatus::Success).await.unwrap(),
            2
        );
        assert_eq!(
            processor.store.count_by_status(OperationStatus::Pending).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn set_interval_enforces_minimum() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        let err = processor.set_interval(Duration::from_millis(999)).unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));

        processor.set_interval(Duration::from_millis(2_500)).unwrap();
        assert_eq!(processor.interval(), Duration::from_millis(2_500));
    }

    #[tokio::test]
    async fn trigger_requires_running_processor() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        let err = processor.trigger().await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidTransition(_)));

        submit_n(&processor, 1, Seller::Flipkart).await;
        processor.start();
        let summary = processor.trigger().await.unwrap();
        processor.stop().await;
        // The manual pass and the scheduled one race for the single
        // operation; between them it was processed exactly once.
        assert!(summary.processed <= 1);
        assert_eq!(
            processor.store.count_by_status(OperationStatus::Success).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn pass_concurrency_is_bounded_by_chunk_size() {
        let fetcher =
            MockFetcher::always("<html></html>").with_delay(Duration::from_millis(30));
        let processor = build_processor(
            fetcher.clone(),
            ProcessorConfig::default().with_chunk_size(3),
        );
        submit_n(&processor, 7, Seller::Flipkart).await;

        let summary = processor.run_pass().await.unwrap();
        assert_eq!(summary.processed, 7);
        assert_eq!(summary.succeeded, 7);
        assert!(
            fetcher.gauge.max_seen() <= 3,
            "saw {} concurrent fetches",
            fetcher.gauge.max_seen()
        );
        assert!(fetcher.gauge.max_seen() > 1, "chunks should run concurrently");
    }

    #[tokio::test]
    async fn pass_processes_oldest_attempt_first() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());

        let mut old = make_test_operation();
        old.url = "https://www.flipkart.com/old/p/itm0".into();
        old.attempt_time = Utc::now() - TimeDelta::minutes(10);
        let old_id = old.id;
        let mut new = make_test_operation();
        new.url = "https://www.flipkart.com/new/p/itm1".into();
        let new_id = new.id;
        // Insert newest first to prove ordering comes from attempt_time.
        processor.store.insert(new);
        processor.store.insert(old);

        let pending = processor.store.pending_ready().await.unwrap();
        assert_eq!(pending[0].id, old_id);
        assert_eq!(pending[1].id, new_id);
    }

    #[tokio::test]
    async fn one_bad_operation_does_not_abort_the_pass() {
        // Meesho has no registered adapter; flipkart does.
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        submit_n(&processor, 1, Seller::Meesho).await;
        submit_n(&processor, 2, Seller::Flipkart).await;

        let summary = processor.run_pass().await.unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            processor.store.count_by_status(OperationStatus::Failed).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn retry_failed_requeues_within_bounds() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());

        // A failed operation with retries left.
        let mut retryable = make_test_operation();
        retryable.url = "https://www.flipkart.com/a/p/itmA".into();
        retryable.status = OperationStatus::Failed;
        retryable.retry_count = 1;
        let retryable_id = retryable.id;

        // One that has exhausted its retries.
        let mut exhausted = make_test_operation();
        exhausted.url = "https://www.flipkart.com/b/p/itmB".into();
        exhausted.status = OperationStatus::Failed;
        exhausted.retry_count = exhausted.max_retries;
        let exhausted_id = exhausted.id;

        processor.store.insert(retryable);
        processor.store.insert(exhausted);

        let outcomes = processor.retry_failed().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].id, retryable_id);
        assert!(outcomes[0].error.is_none());

        let retried = processor.store.get(retryable_id).await.unwrap().unwrap();
        assert_eq!(retried.status, OperationStatus::Success);
        assert_eq!(retried.retry_count, 2);

        // Untouched: still failed, count unchanged.
        let untouched = processor.store.get(exhausted_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OperationStatus::Failed);
        assert_eq!(untouched.retry_count, untouched.max_retries);
    }

    #[tokio::test]
    async fn cleanup_respects_age_and_status() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        let now = Utc::now();

        let mut old_success = make_test_operation();
        old_success.url = "https://www.flipkart.com/old/p/1".into();
        old_success.status = OperationStatus::Success;
        old_success.finished_at = Some(now - TimeDelta::days(31));
        old_success.data_file = Some("results/old.json".into());
        let old_id = old_success.id;

        let mut fresh_success = make_test_operation();
        fresh_success.url = "https://www.flipkart.com/fresh/p/2".into();
        fresh_success.status = OperationStatus::Success;
        fresh_success.finished_at = Some(now - TimeDelta::days(29));
        let fresh_id = fresh_success.id;

        let mut old_pending = make_test_operation();
        old_pending.url = "https://www.flipkart.com/pending/p/3".into();
        old_pending.attempt_time = now - TimeDelta::days(90);
        old_pending.created_at = now - TimeDelta::days(90);
        old_pending.updated_at = now - TimeDelta::days(90);
        let pending_id = old_pending.id;

        processor.store.insert(old_success);
        processor.store.insert(fresh_success);
        processor.store.insert(old_pending);

        let deleted = processor.cleanup_old(30).await.unwrap();
        assert_eq!(deleted, vec![old_id]);

        // The missing result file was tolerated but attempted.
        assert_eq!(
            processor.results.removed.lock().unwrap().as_slice(),
            ["results/old.json"]
        );

        assert!(processor.store.get(old_id).await.unwrap().is_none());
        assert!(processor.store.get(fresh_id).await.unwrap().is_some());
        assert!(processor.store.get(pending_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn status_reports_running_flag_and_counts() {
        let processor =
            build_processor(MockFetcher::always("<html></html>"), ProcessorConfig::default());
        submit_n(&processor, 3, Seller::Flipkart).await;

        let status = processor.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.interval_ms, 5_000);
        assert_eq!(status.pending, 3);
        assert_eq!(status.in_progress, 0);
        assert_eq!(status.counts.pending, 3);
        assert_eq!(status.sellers.len(), 1);
        assert_eq!(status.sellers[0].seller, Seller::Flipkart);
        assert_eq!(status.recent.len(), 3);
    }
}
