use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use shelfwatch_core::log::{LogFilter, LogStore, NewLogEntry};
use shelfwatch_core::operation::{OperationKind, OperationStatus};
use shelfwatch_core::store::PageRequest;
use shelfwatch_db::LogRepository;

use crate::integration::common::setup_test_db;

fn entry(operation_id: Option<Uuid>, status: OperationStatus) -> NewLogEntry {
    NewLogEntry {
        logged_at: None,
        platform: "flipkart".to_string(),
        kind: OperationKind::Product,
        url: "https://www.flipkart.com/x/p/1".to_string(),
        category: Some("phones".to_string()),
        status,
        action: "System".to_string(),
        operation_id,
    }
}

#[tokio::test]
async fn append_defaults_logged_at_to_now() {
    let (pool, _container) = setup_test_db().await;
    let repo = LogRepository::new(pool);

    let created = repo.append(entry(None, OperationStatus::Pending)).await.unwrap();
    assert_eq!(created.platform, "flipkart");
    assert_eq!(created.status, OperationStatus::Pending);
    assert!(Utc::now() - created.logged_at < TimeDelta::minutes(1));
}

#[tokio::test]
async fn advance_updates_latest_entry_for_operation() {
    let (pool, _container) = setup_test_db().await;
    let repo = LogRepository::new(pool);
    let op_id = Uuid::new_v4();

    let mut first = entry(Some(op_id), OperationStatus::Pending);
    first.logged_at = Some(Utc::now() - TimeDelta::minutes(5));
    repo.append(first).await.unwrap();
    let latest = repo.append(entry(Some(op_id), OperationStatus::Pending)).await.unwrap();

    let advanced = repo
        .advance(op_id, OperationStatus::InProgress, "System")
        .await
        .unwrap()
        .expect("latest entry should be updated");
    assert_eq!(advanced.id, latest.id);
    assert_eq!(advanced.status, OperationStatus::InProgress);

    // Unknown operation: no entry to advance, no error.
    let none = repo
        .advance(Uuid::new_v4(), OperationStatus::Failed, "System")
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn update_entry_corrects_a_single_row() {
    let (pool, _container) = setup_test_db().await;
    let repo = LogRepository::new(pool);

    let created = repo.append(entry(None, OperationStatus::Failed)).await.unwrap();
    let corrected = repo
        .update_entry(created.id, OperationStatus::Cancelled, "Manual")
        .await
        .unwrap()
        .expect("entry exists");
    assert_eq!(corrected.status, OperationStatus::Cancelled);
    assert_eq!(corrected.action, "Manual");

    let missing = repo
        .update_entry(Uuid::new_v4(), OperationStatus::Pending, "Manual")
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let (pool, _container) = setup_test_db().await;
    let repo = LogRepository::new(pool);

    for status in [
        OperationStatus::Success,
        OperationStatus::Success,
        OperationStatus::Failed,
    ] {
        repo.append(entry(None, status)).await.unwrap();
    }
    let mut other = entry(None, OperationStatus::Success);
    other.platform = "myntra".to_string();
    repo.append(other).await.unwrap();

    let page = repo
        .list(
            &LogFilter { status: Some(OperationStatus::Success), ..Default::default() },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);

    let page = repo
        .list(
            &LogFilter { platform: Some("myntra".into()), ..Default::default() },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let page = repo
        .list(&LogFilter::default(), &PageRequest { page: 1, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn stats_aggregate_counts_rate_and_daily_series() {
    let (pool, _container) = setup_test_db().await;
    let repo = LogRepository::new(pool);
    let today = Utc::now();
    let yesterday = today - TimeDelta::days(1);

    for (when, status) in [
        (yesterday, OperationStatus::Success),
        (yesterday, OperationStatus::Failed),
        (today, OperationStatus::Success),
        (today, OperationStatus::Success),
    ] {
        let mut e = entry(None, status);
        e.logged_at = Some(when);
        repo.append(e).await.unwrap();
    }

    let stats = repo.stats(None, None).await.unwrap();
    assert_eq!(stats.success, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 4);
    assert_eq!(stats.success_rate, 75.0);

    // Daily series is ascending and grouped per status.
    assert!(!stats.daily.is_empty());
    let days: Vec<_> = stats.daily.iter().map(|d| d.day).collect();
    let mut sorted = days.clone();
    sorted.sort();
    assert_eq!(days, sorted);
    let yesterday_success = stats
        .daily
        .iter()
        .find(|d| d.day == yesterday.date_naive() && d.status == OperationStatus::Success)
        .expect("series entry for yesterday");
    assert_eq!(yesterday_success.count, 1);

    // Range limited to today only.
    let stats = repo
        .stats(Some(today - TimeDelta::hours(1)), None)
        .await
        .unwrap();
    assert_eq!(stats.success, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.success_rate, 100.0);
}
