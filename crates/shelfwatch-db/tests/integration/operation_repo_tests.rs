use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::operation::{
    CompletedOutcome, CreateOperationRequest, OperationKind, OperationStatus,
};
use shelfwatch_core::seller::Seller;
use shelfwatch_core::store::{
    OperationFilter, OperationStore, PageRequest, SortOrder, SortSpec,
};
use shelfwatch_db::OperationRepository;

use crate::integration::common::setup_test_db;

fn test_request(url: &str) -> CreateOperationRequest {
    CreateOperationRequest::new(url, Seller::Flipkart, OperationKind::Product)
}

#[tokio::test]
async fn create_operation_and_verify_fields() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(
            test_request("https://www.flipkart.com/x/p/1")
                .with_category("phones")
                .with_notes("smoke")
                .with_tags(vec!["a".into(), "b".into()]),
        )
        .await
        .unwrap();

    assert_eq!(op.url, "https://www.flipkart.com/x/p/1");
    assert_eq!(op.seller, Seller::Flipkart);
    assert_eq!(op.kind, OperationKind::Product);
    assert_eq!(op.status, OperationStatus::Pending);
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.max_retries, 3);
    assert!(op.config.use_browser);
    assert_eq!(op.config.timeout_ms, 30_000);
    assert_eq!(op.category.as_deref(), Some("phones"));
    assert_eq!(op.tags, vec!["a".to_string(), "b".to_string()]);
    assert!(op.started_at.is_none());
}

#[tokio::test]
async fn duplicate_active_url_is_rejected() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    repo.create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();

    let err = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Conflict(_)));

    // A different URL is fine.
    repo.create(test_request("https://www.flipkart.com/x/p/2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn terminal_operation_frees_the_url() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();
    repo.mark_started(op.id).await.unwrap();
    repo.mark_completed(op.id, CompletedOutcome::default()).await.unwrap();

    // The URL is no longer active, so a new submission is accepted.
    repo.create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn full_lifecycle_success_path() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();

    let started = repo.mark_started(op.id).await.unwrap();
    assert_eq!(started.status, OperationStatus::InProgress);
    assert!(started.started_at.is_some());

    let outcome = CompletedOutcome {
        total_products: 5,
        scraped_products: 4,
        failed_products: 1,
        scraped_data: Some(serde_json::json!({"products": []})),
        data_file: Some("results/file.json".into()),
    };
    let done = repo.mark_completed(op.id, outcome).await.unwrap();
    assert_eq!(done.status, OperationStatus::Success);
    assert_eq!(done.progress.percentage, 100);
    assert_eq!(done.progress.total, 5);
    assert_eq!(done.data_file.as_deref(), Some("results/file.json"));
    assert!(done.duration().is_some());

    let fetched = repo.get(op.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, OperationStatus::Success);
    assert_eq!(fetched.scraped_products, 4);
}

#[tokio::test]
async fn start_requires_pending_status() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();
    repo.mark_started(op.id).await.unwrap();

    let err = repo.mark_started(op.id).await.unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidTransition(_)));
}

#[tokio::test]
async fn complete_requires_in_progress_status() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();

    let err = repo
        .mark_completed(op.id, CompletedOutcome::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidTransition(_)));
}

#[tokio::test]
async fn fail_then_retry_until_exhausted() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1").with_max_retries(1))
        .await
        .unwrap();

    repo.mark_started(op.id).await.unwrap();
    let failed = repo
        .mark_failed(op.id, "HTTP 503", Some(serde_json::json!({"kind": "fetch_error"})))
        .await
        .unwrap();
    assert_eq!(failed.status, OperationStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("HTTP 503"));

    let retried = repo.increment_retry(op.id).await.unwrap();
    assert_eq!(retried.status, OperationStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.started_at.is_none());

    repo.mark_started(op.id).await.unwrap();
    repo.mark_failed(op.id, "HTTP 503 again", None).await.unwrap();

    // Retries exhausted now.
    let err = repo.increment_retry(op.id).await.unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidTransition(_)));
    let final_op = repo.get(op.id).await.unwrap().unwrap();
    assert_eq!(final_op.retry_count, 1);
}

#[tokio::test]
async fn cancel_is_terminal_and_delete_removes() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let op = repo
        .create(test_request("https://www.flipkart.com/x/p/1"))
        .await
        .unwrap();

    let cancelled = repo.mark_cancelled(op.id).await.unwrap();
    assert_eq!(cancelled.status, OperationStatus::Cancelled);

    let err = repo.mark_started(op.id).await.unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidTransition(_)));

    repo.delete(op.id).await.unwrap();
    assert!(repo.get(op.id).await.unwrap().is_none());
    assert!(matches!(
        repo.delete(op.id).await.unwrap_err(),
        ScrapeError::NotFound(_)
    ));
}

#[tokio::test]
async fn list_filters_sorts_and_paginates() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    for i in 0..5 {
        repo.create(
            CreateOperationRequest::new(
                format!("https://www.flipkart.com/x/p/{i}"),
                Seller::Flipkart,
                OperationKind::Product,
            )
            .with_category("mobile-phones"),
        )
        .await
        .unwrap();
    }
    repo.create(
        CreateOperationRequest::new(
            "https://www.myntra.com/jacket/1",
            Seller::Myntra,
            OperationKind::Product,
        )
        .with_notes("winter drop"),
    )
    .await
    .unwrap();

    // Filter by seller.
    let page = repo
        .list(
            &OperationFilter { seller: Some(Seller::Flipkart), ..Default::default() },
            &SortSpec::default(),
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);

    // Category regex.
    let page = repo
        .list(
            &OperationFilter { category: Some("^mobile".into()), ..Default::default() },
            &SortSpec::default(),
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);

    // Free-text search over notes.
    let page = repo
        .list(
            &OperationFilter { search: Some("winter".into()), ..Default::default() },
            &SortSpec::default(),
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].seller, Seller::Myntra);

    // Pagination: 6 rows, pages of 4.
    let first = repo
        .list(
            &OperationFilter::default(),
            &SortSpec { sort_by: "url".into(), order: SortOrder::Asc },
            &PageRequest { page: 1, limit: 4 },
        )
        .await
        .unwrap();
    assert_eq!(first.total, 6);
    assert_eq!(first.items.len(), 4);
    let second = repo
        .list(
            &OperationFilter::default(),
            &SortSpec { sort_by: "url".into(), order: SortOrder::Asc },
            &PageRequest { page: 2, limit: 4 },
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 2);
}

#[tokio::test]
async fn worklists_and_aggregations() {
    let (pool, _container) = setup_test_db().await;
    let repo = OperationRepository::new(pool);

    let a = repo.create(test_request("https://www.flipkart.com/a/p/1")).await.unwrap();
    let b = repo.create(test_request("https://www.flipkart.com/b/p/2")).await.unwrap();
    let c = repo
        .create(CreateOperationRequest::new(
            "https://www.myntra.com/c/3",
            Seller::Myntra,
            OperationKind::Product,
        ))
        .await
        .unwrap();

    // a succeeds, b fails (retryable), c stays pending.
    repo.mark_started(a.id).await.unwrap();
    repo.mark_completed(a.id, CompletedOutcome::default()).await.unwrap();
    repo.mark_started(b.id).await.unwrap();
    repo.mark_failed(b.id, "boom", None).await.unwrap();

    let pending = repo.pending_ready().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, c.id);

    let retryable = repo.failed_retryable().await.unwrap();
    assert_eq!(retryable.len(), 1);
    assert_eq!(retryable[0].id, b.id);

    assert_eq!(repo.count_by_status(OperationStatus::Success).await.unwrap(), 1);
    let counts = repo.status_counts().await.unwrap();
    assert_eq!(counts.success, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.pending, 1);

    let sellers = repo.seller_stats().await.unwrap();
    let flipkart = sellers.iter().find(|s| s.seller == Seller::Flipkart).unwrap();
    assert_eq!(flipkart.total, 2);
    assert_eq!(flipkart.success, 1);
    assert_eq!(flipkart.failed, 1);
    assert_eq!(flipkart.success_rate, 50.0);
    let myntra = sellers.iter().find(|s| s.seller == Seller::Myntra).unwrap();
    assert_eq!(myntra.active, 1);
    assert_eq!(myntra.success_rate, 0.0);

    let recent = repo.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);

    // Nothing is old enough for cleanup yet.
    let expired = repo
        .terminal_older_than(chrono::Utc::now() - chrono::TimeDelta::days(1))
        .await
        .unwrap();
    assert!(expired.is_empty());
    // Everything terminal is younger than a future cutoff; pending is excluded.
    let expired = repo
        .terminal_older_than(chrono::Utc::now() + chrono::TimeDelta::days(1))
        .await
        .unwrap();
    assert_eq!(expired.len(), 2);
    assert!(expired.iter().all(|op| op.id != c.id));
}
