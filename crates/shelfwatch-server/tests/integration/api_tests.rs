use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{TEST_API_KEY, setup_test_app};

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header("authorization", format!("Bearer {TEST_API_KEY}"))
}

fn create_body(url: &str) -> Body {
    Body::from(
        serde_json::to_vec(&serde_json::json!({
            "url": url,
            "seller": "flipkart",
            "type": "product",
        }))
        .unwrap(),
    )
}

async fn create_operation(app: &crate::integration::common::TestApp, url: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/operations"))
                .header("content-type", "application/json")
                .body(create_body(url))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    json["operation"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/operations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/operations")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_get_operation() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    let response = app
        .router
        .oneshot(
            authed(Request::get(format!("/v1/operations/{id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["operation"]["id"], id.as_str());
    assert_eq!(json["operation"]["status"], "pending");
    assert_eq!(json["operation"]["url"], "https://www.flipkart.com/x/p/1");
    assert_eq!(json["operation"]["use_browser"], true);
}

#[tokio::test]
async fn duplicate_active_url_returns_409() {
    let app = setup_test_app().await;
    create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    let response = app
        .router
        .oneshot(
            authed(Request::post("/v1/operations"))
                .header("content-type", "application/json")
                .body(create_body("https://www.flipkart.com/x/p/1"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn validation_failures_return_400() {
    let app = setup_test_app().await;

    // Unknown seller.
    let body = serde_json::json!({"url": "https://x.com/p/1", "seller": "ebay", "type": "product"});
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/operations"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Malformed URL.
    let body =
        serde_json::json!({"url": "not a url", "seller": "flipkart", "type": "product"});
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/operations"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Timeout outside the documented bounds.
    let body = serde_json::json!({
        "url": "https://www.flipkart.com/x/p/1",
        "seller": "flipkart",
        "type": "product",
        "timeout_ms": 1,
    });
    let response = app
        .router
        .oneshot(
            authed(Request::post("/v1/operations"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn get_missing_operation_returns_404() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            authed(Request::get(format!(
                "/v1/operations/{}",
                uuid::Uuid::new_v4()
            )))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lifecycle_endpoints_enforce_preconditions() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    // Completing a pending operation violates the state machine.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/complete")))
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_transition");

    // Start, then complete with a payload.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/start")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["operation"]["status"], "in_progress");

    let body = serde_json::json!({
        "scraped_data": {"title": "Widget"},
        "total_products": 1,
    });
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/complete")))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["operation"]["status"], "success");
    assert_eq!(json["operation"]["progress"]["percentage"], 100);

    // Data retrieval prefers the inline payload.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::get(format!("/v1/operations/{id}/data")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["source"], "inline");
    assert_eq!(json["data"]["title"], "Widget");

    // A terminal operation cannot be started again.
    let response = app
        .router
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/start")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fail_and_retry_roundtrip() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    // Retry before failure is a precondition violation.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/retry")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({"message": "upstream 503", "details": {"code": 503}});
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/fail")))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["operation"]["status"], "failed");
    assert_eq!(json["operation"]["error_message"], "upstream 503");

    let response = app
        .router
        .oneshot(
            authed(Request::post(format!("/v1/operations/{id}/retry")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["operation"]["status"], "pending");
    assert_eq!(json["operation"]["retry_count"], 1);
}

#[tokio::test]
async fn cancel_operation_is_terminal() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::delete(format!("/v1/operations/{id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["operation"]["status"], "cancelled");

    // Cancelling again violates the state machine.
    let response = app
        .router
        .oneshot(
            authed(Request::delete(format!("/v1/operations/{id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn data_endpoint_requires_success_status() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    let response = app
        .router
        .oneshot(
            authed(Request::get(format!("/v1/operations/{id}/data")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn processor_endpoints() {
    let app = setup_test_app().await;

    // Status reports a stopped processor.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::get("/v1/processor/status"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["running"], false);
    assert_eq!(json["interval_ms"], 5000);

    // Trigger requires a running processor.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/processor/trigger"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Interval below the minimum is rejected.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/processor/interval"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"interval_ms": 500}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A valid interval is accepted and visible in status.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/processor/interval"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"interval_ms": 2000}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::get("/v1/processor/status"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["interval_ms"], 2000);

    // Cleanup with nothing eligible returns an empty report.
    let response = app
        .router
        .oneshot(
            authed(Request::post("/v1/processor/cleanup"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"days_old": 30}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn operation_creation_writes_an_audit_log() {
    let app = setup_test_app().await;
    let id = create_operation(&app, "https://www.flipkart.com/x/p/1").await;

    let response = app
        .router
        .oneshot(
            authed(Request::get("/v1/logs?platform=flipkart"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["logs"][0]["operation_id"], id.as_str());
    assert_eq!(json["logs"][0]["status"], "pending");
    assert_eq!(json["logs"][0]["action"], "Manual");
}

#[tokio::test]
async fn log_endpoints_roundtrip() {
    let app = setup_test_app().await;

    let body = serde_json::json!({
        "platform": "myntra",
        "type": "product",
        "url": "https://www.myntra.com/jacket/1",
        "status": "success",
    });
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/logs"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    let log_id = json["id"].as_str().unwrap().to_string();

    // Correct the entry.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::patch(format!("/v1/logs/{log_id}")))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status": "cancelled"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "cancelled");

    // Stats include the entry and a daily series.
    let response = app
        .router
        .oneshot(
            authed(Request::get("/v1/logs/stats"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["cancelled"], 1);
    assert!(json["daily"].as_array().is_some());
}
