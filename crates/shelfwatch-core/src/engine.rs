use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::adapter::{AdapterRegistry, SiteAdapter};
use crate::error::ScrapeError;
use crate::log::{LogStore, NewLogEntry};
use crate::operation::{
    CompletedOutcome, DEFAULT_LINK_PACING, OperationKind, OperationStatus, ScrapeOperation,
};
use crate::product::CategoryPage;
use crate::results::ResultStore;
use crate::store::OperationStore;
use crate::traits::{FetchConfig, Fetcher};

/// Maximum product links followed by the generic category fallback.
pub const CATEGORY_LINK_CAP: usize = 10;

/// Executes a single operation end-to-end: resolve the adapter, fetch
/// the page, extract, persist the result or the failure, keep the audit
/// log current.
///
/// Generic over all external dependencies via traits, so tests run the
/// full contract against in-memory fakes.
pub struct ScrapeEngine<F, S, L, R>
where
    F: Fetcher,
    S: OperationStore,
    L: LogStore,
    R: ResultStore,
{
    fetcher: F,
    store: S,
    logs: L,
    results: R,
    registry: Arc<AdapterRegistry>,
    /// Delay between sequential link fetches in the category fallback.
    link_pacing: Duration,
}

impl<F, S, L, R> Clone for ScrapeEngine<F, S, L, R>
where
    F: Fetcher,
    S: OperationStore,
    L: LogStore,
    R: ResultStore,
{
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            logs: self.logs.clone(),
            results: self.results.clone(),
            registry: self.registry.clone(),
            link_pacing: self.link_pacing,
        }
    }
}

impl<F, S, L, R> ScrapeEngine<F, S, L, R>
where
    F: Fetcher,
    S: OperationStore,
    L: LogStore,
    R: ResultStore,
{
    pub fn new(fetcher: F, store: S, logs: L, results: R, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            fetcher,
            store,
            logs,
            results,
            registry,
            link_pacing: DEFAULT_LINK_PACING,
        }
    }

    /// Override the pacing delay between category-fallback link fetches.
    pub fn with_link_pacing(mut self, pacing: Duration) -> Self {
        self.link_pacing = pacing;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one operation.
    ///
    /// Execution-phase failures (adapter resolution, fetch, extraction)
    /// are recorded on the operation via `mark_failed` and in the log
    /// before being re-raised, so the record is never left dangling even
    /// though the caller also observes the error. A missing operation or
    /// a non-`pending` one is a caller error and propagates untouched.
    pub async fn execute_operation(&self, id: Uuid) -> Result<ScrapeOperation, ScrapeError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ScrapeError::NotFound(format!("operation {id}")))?;

        let op = self.store.mark_started(id).await?;
        self.record_transition(&op, OperationStatus::InProgress).await;
        tracing::info!(operation_id = %id, url = %op.url, seller = %op.seller, "Operation started");

        match self.run(&op).await {
            Ok(outcome) => {
                let done = self.store.mark_completed(id, outcome).await?;
                self.record_transition(&done, OperationStatus::Success).await;
                tracing::info!(
                    operation_id = %id,
                    total = done.total_products,
                    scraped = done.scraped_products,
                    "Operation completed"
                );
                Ok(done)
            }
            Err(e) => {
                let details = serde_json::json!({
                    "kind": e.kind(),
                    "message": e.to_string(),
                    "timestamp": Utc::now(),
                });
                if let Err(store_err) = self
                    .store
                    .mark_failed(id, &e.to_string(), Some(details))
                    .await
                {
                    tracing::error!(
                        operation_id = %id,
                        error = %store_err,
                        "Failed to record operation failure"
                    );
                }
                self.record_transition(&op, OperationStatus::Failed).await;
                tracing::warn!(operation_id = %id, error = %e, "Operation failed");
                Err(e)
            }
        }
    }

    /// Best-effort audit trail update: advance the operation's latest
    /// log entry, or append one if the operation has none yet. Failures
    /// here never surface to the caller.
    async fn record_transition(&self, op: &ScrapeOperation, status: OperationStatus) {
        if self
            .logs
            .advance_quietly(op.id, status, "System")
            .await
            .is_none()
        {
            self.logs
                .append_quietly(NewLogEntry {
                    logged_at: None,
                    platform: op.seller.to_string(),
                    kind: op.kind,
                    url: op.url.clone(),
                    category: op.category.clone(),
                    status,
                    action: "System".to_string(),
                    operation_id: Some(op.id),
                })
                .await;
        }
    }

    /// The execution phase proper: everything here that errors sends the
    /// operation to `failed`.
    async fn run(&self, op: &ScrapeOperation) -> Result<CompletedOutcome, ScrapeError> {
        let adapter = self.registry.resolve(op.seller)?;
        let fetch_config = FetchConfig::from(op.config);
        let content = self.fetcher.fetch(&op.url, &fetch_config).await?;

        match op.kind {
            OperationKind::Product => {
                let mut record = adapter.scrape_product(&content)?;
                if record.url.is_none() {
                    record.url = Some(op.url.clone());
                }
                let data = serde_json::to_value(&record)?;
                let file = self.results.write(op.seller, op.kind, &data).await?;
                Ok(CompletedOutcome {
                    total_products: 1,
                    scraped_products: 1,
                    failed_products: 0,
                    scraped_data: Some(data),
                    data_file: Some(file),
                })
            }
            OperationKind::Category => {
                let (page, attempted) = if adapter.supports_category() {
                    let page = adapter.scrape_category(&content)?;
                    let attempted = page.products.len() as u32;
                    (page, attempted)
                } else {
                    self.category_fallback(op, adapter.as_ref(), &content, &fetch_config)
                        .await
                };

                let scraped = page.products.len() as u32;
                let data = serde_json::to_value(&page)?;
                let file = self.results.write(op.seller, op.kind, &data).await?;
                Ok(CompletedOutcome {
                    total_products: attempted,
                    scraped_products: scraped,
                    failed_products: attempted.saturating_sub(scraped),
                    scraped_data: Some(data),
                    data_file: Some(file),
                })
            }
        }
    }

    /// Generic category strategy for adapters without native category
    /// support: scan the fetched page for product-like links, follow the
    /// first [`CATEGORY_LINK_CAP`] of them with pacing between requests,
    /// and extract each as a product page. A failing link is logged and
    /// excluded; it never fails the category operation.
    async fn category_fallback(
        &self,
        op: &ScrapeOperation,
        adapter: &dyn SiteAdapter,
        content: &str,
        fetch_config: &FetchConfig,
    ) -> (CategoryPage, u32) {
        let links = extract_product_links(content, &op.url, CATEGORY_LINK_CAP);
        tracing::debug!(
            operation_id = %op.id,
            candidates = links.len(),
            "Category fallback: following product links"
        );

        let mut products = Vec::new();
        for (i, link) in links.iter().enumerate() {
            if i > 0 && !self.link_pacing.is_zero() {
                tokio::time::sleep(self.link_pacing).await;
            }
            let result = match self.fetcher.fetch(link, fetch_config).await {
                Ok(page) => adapter.scrape_product(&page),
                Err(e) => Err(e),
            };
            match result {
                Ok(mut record) => {
                    if record.url.is_none() {
                        record.url = Some(link.clone());
                    }
                    products.push(record);
                }
                Err(e) => {
                    tracing::warn!(
                        operation_id = %op.id,
                        link = %link,
                        error = %e,
                        "Skipping failed product link"
                    );
                }
            }
        }

        let attempted = links.len() as u32;
        (CategoryPage { products }, attempted)
    }
}

/// Scan raw HTML for product-page links, resolved against `base_url`,
/// deduplicated, capped at `cap`.
///
/// Recognises the path shapes the supported marketplaces use for
/// product pages (`/p/`, `/dp/`, `/product/`, `/itm/`, `/prod/`).
pub fn extract_product_links(content: &str, base_url: &str, cap: usize) -> Vec<String> {
    const PATTERNS: [&str; 5] = ["/p/", "/dp/", "/product/", "/itm/", "/prod/"];

    let base = match url::Url::parse(base_url) {
        Ok(parsed) => parsed,
        Err(_) => return Vec::new(),
    };

    let mut links: Vec<String> = Vec::new();
    let mut rest = content;
    while let Some(pos) = rest.find("href=\"") {
        rest = &rest[pos + 6..];
        let Some(end) = rest.find('"') else { break };
        let raw = &rest[..end];
        rest = &rest[end..];

        if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") {
            continue;
        }
        let Ok(resolved) = base.join(raw) else { continue };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if !PATTERNS.iter().any(|p| resolved.path().contains(p)) {
            continue;
        }
        let link = resolved.to_string();
        if !links.contains(&link) {
            links.push(link);
            if links.len() >= cap {
                break;
            }
        }
    }
    links
}
