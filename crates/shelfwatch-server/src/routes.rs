use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::log::{LogFilter, LogStore, NewLogEntry};
use shelfwatch_core::operation::{
    CompletedOutcome, CreateOperationRequest, OperationConfig, OperationKind, OperationStatus,
    ScrapeOperation,
};
use shelfwatch_core::results::ResultStore;
use shelfwatch_core::seller::Seller;
use shelfwatch_core::store::{
    OperationFilter, OperationStore, PageRequest, SortOrder, SortSpec,
};

use crate::auth::require_api_key;
use crate::dto::{
    CleanupBody, CleanupResponse, CompleteOperationBody, CreateLogBody, CreateOperationBody,
    ErrorResponse, FailOperationBody, HealthResponse, IntervalBody, ListLogsQuery,
    ListOperationsQuery, LogListResponse, LogResponse, LogStatsQuery, LogStatsResponse,
    MessageResponse, OperationDataResponse, OperationEnvelope, OperationListResponse,
    OperationResponse, OperationStatsResponse, PassSummaryResponse, ProcessorStatusResponse,
    RetryReportResponse, UpdateLogBody,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/operations", post(create_operation))
        .route("/v1/operations", get(list_operations))
        .route("/v1/operations/stats", get(operation_stats))
        .route("/v1/operations/{id}", get(get_operation))
        .route("/v1/operations/{id}", delete(cancel_operation))
        .route("/v1/operations/{id}/start", post(start_operation))
        .route("/v1/operations/{id}/complete", post(complete_operation))
        .route("/v1/operations/{id}/fail", post(fail_operation))
        .route("/v1/operations/{id}/retry", post(retry_operation))
        .route("/v1/operations/{id}/data", get(get_operation_data))
        .route("/v1/processor/status", get(processor_status))
        .route("/v1/processor/start", post(processor_start))
        .route("/v1/processor/stop", post(processor_stop))
        .route("/v1/processor/trigger", post(processor_trigger))
        .route("/v1/processor/retry-failed", post(processor_retry_failed))
        .route("/v1/processor/cleanup", post(processor_cleanup))
        .route("/v1/processor/interval", post(processor_interval))
        .route("/v1/logs", post(create_log))
        .route("/v1/logs", get(list_logs))
        .route("/v1/logs/stats", get(log_stats))
        .route("/v1/logs/{id}", patch(update_log))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// -- parsing helpers --------------------------------------------------------

fn parse_seller(raw: &str) -> Result<Seller, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError(ScrapeError::Validation(e)))
}

fn parse_kind(raw: &str) -> Result<OperationKind, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError(ScrapeError::Validation(e)))
}

fn parse_status(raw: &str) -> Result<OperationStatus, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError(ScrapeError::Validation(e)))
}

fn not_found_response(id: Uuid) -> axum::response::Response {
    let body = ErrorResponse {
        success: false,
        error: "not_found".to_string(),
        message: format!("Operation not found: {id}"),
    };
    (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
}

/// Best-effort audit entry for a manually driven transition.
async fn record_manual_log(state: &AppState, op: &ScrapeOperation) {
    let logs = state.db.log_repo();
    if logs
        .advance_quietly(op.id, op.status, "Manual")
        .await
        .is_none()
    {
        logs.append_quietly(NewLogEntry {
            logged_at: None,
            platform: op.seller.to_string(),
            kind: op.kind,
            url: op.url.clone(),
            category: op.category.clone(),
            status: op.status,
            action: "Manual".to_string(),
            operation_id: Some(op.id),
        })
        .await;
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/operations",
    request_body = CreateOperationBody,
    responses(
        (status = 201, description = "Operation created", body = OperationEnvelope),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 409, description = "Active operation exists for URL", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn create_operation(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<CreateOperationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let seller = parse_seller(&body.seller)?;
    let kind = parse_kind(&body.kind)?;

    let defaults = OperationConfig::default();
    let config = OperationConfig {
        use_browser: body.use_browser.unwrap_or(defaults.use_browser),
        timeout_ms: body.timeout_ms.unwrap_or(defaults.timeout_ms),
        wait_time_ms: body.wait_time_ms.unwrap_or(defaults.wait_time_ms),
    };

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    let mut request = CreateOperationRequest::new(body.url, seller, kind).with_config(config);
    request.category = body.category;
    request.notes = body.notes;
    request.tags = body.tags.unwrap_or_default();
    request.max_retries = body.max_retries;
    request.user_agent = user_agent;
    request.ip_address = ip_address;
    request.validate()?;

    let op = state.db.operation_repo().create(request).await?;

    // Creation gets its own audit entry.
    state
        .db
        .log_repo()
        .append_quietly(NewLogEntry {
            logged_at: None,
            platform: op.seller.to_string(),
            kind: op.kind,
            url: op.url.clone(),
            category: op.category.clone(),
            status: op.status,
            action: "Manual".to_string(),
            operation_id: Some(op.id),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        axum::Json(OperationEnvelope::new("Operation created", op)),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/operations",
    params(ListOperationsQuery),
    responses(
        (status = 200, description = "List of operations", body = OperationListResponse),
        (status = 400, description = "Bad filter", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn list_operations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = OperationFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        seller: query.seller.as_deref().map(parse_seller).transpose()?,
        kind: query.kind.as_deref().map(parse_kind).transpose()?,
        category: query.category,
        created_after: query.from,
        created_before: query.to,
        search: query.search,
    };
    let sort = SortSpec {
        sort_by: query.sort_by.unwrap_or_else(|| "created_at".to_string()),
        order: match query.sort_order.as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        },
    };
    let page = PageRequest {
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(20).min(100),
    };

    let result = state.db.operation_repo().list(&filter, &sort, &page).await?;

    Ok(axum::Json(OperationListResponse {
        success: true,
        operations: result.items.into_iter().map(OperationResponse::from).collect(),
        total: result.total,
        page: page.page,
        limit: page.limit,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/operations/stats",
    responses(
        (status = 200, description = "Aggregated operation stats", body = OperationStatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn operation_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.operation_repo();
    let counts = repo.status_counts().await?;
    let sellers = repo.seller_stats().await?;
    let recent = repo.recent(10).await?;

    Ok(axum::Json(OperationStatsResponse {
        success: true,
        counts: counts.into(),
        sellers: sellers.into_iter().map(Into::into).collect(),
        recent: recent.into_iter().map(OperationResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/operations/{id}",
    params(("id" = Uuid, Path, description = "Operation ID")),
    responses(
        (status = 200, description = "Operation details", body = OperationEnvelope),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn get_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.operation_repo().get(id).await? {
        Some(op) => Ok(axum::Json(OperationEnvelope::new("OK", op)).into_response()),
        None => Ok(not_found_response(id)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/operations/{id}",
    params(("id" = Uuid, Path, description = "Operation ID")),
    responses(
        (status = 200, description = "Operation cancelled", body = OperationEnvelope),
        (status = 400, description = "Already terminal", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn cancel_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let op = state.db.operation_repo().mark_cancelled(id).await?;
    record_manual_log(&state, &op).await;
    Ok(axum::Json(OperationEnvelope::new("Operation cancelled", op)))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{id}/start",
    params(("id" = Uuid, Path, description = "Operation ID")),
    responses(
        (status = 200, description = "Operation started", body = OperationEnvelope),
        (status = 400, description = "Not pending", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn start_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let op = state.db.operation_repo().mark_started(id).await?;
    record_manual_log(&state, &op).await;
    Ok(axum::Json(OperationEnvelope::new("Operation started", op)))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{id}/complete",
    params(("id" = Uuid, Path, description = "Operation ID")),
    request_body = CompleteOperationBody,
    responses(
        (status = 200, description = "Operation completed", body = OperationEnvelope),
        (status = 400, description = "Not in progress", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn complete_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<CompleteOperationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let total = body.total_products.unwrap_or(0);
    let outcome = CompletedOutcome {
        total_products: total,
        scraped_products: body.scraped_products.unwrap_or(total),
        failed_products: body.failed_products.unwrap_or(0),
        scraped_data: body.scraped_data,
        data_file: body.data_file,
    };
    let op = state.db.operation_repo().mark_completed(id, outcome).await?;
    record_manual_log(&state, &op).await;
    Ok(axum::Json(OperationEnvelope::new("Operation completed", op)))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{id}/fail",
    params(("id" = Uuid, Path, description = "Operation ID")),
    request_body = FailOperationBody,
    responses(
        (status = 200, description = "Operation failed", body = OperationEnvelope),
        (status = 400, description = "Already terminal", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn fail_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<FailOperationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let op = state
        .db
        .operation_repo()
        .mark_failed(id, &body.message, body.details)
        .await?;
    record_manual_log(&state, &op).await;
    Ok(axum::Json(OperationEnvelope::new("Operation marked failed", op)))
}

#[utoipa::path(
    post,
    path = "/v1/operations/{id}/retry",
    params(("id" = Uuid, Path, description = "Operation ID")),
    responses(
        (status = 200, description = "Operation re-queued", body = OperationEnvelope),
        (status = 400, description = "Not failed or retries exhausted", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn retry_operation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let op = state.db.operation_repo().increment_retry(id).await?;
    record_manual_log(&state, &op).await;
    Ok(axum::Json(OperationEnvelope::new("Operation re-queued", op)))
}

#[utoipa::path(
    get,
    path = "/v1/operations/{id}/data",
    params(("id" = Uuid, Path, description = "Operation ID")),
    responses(
        (status = 200, description = "Scraped result data", body = OperationDataResponse),
        (status = 404, description = "No data available", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "operations"
)]
pub async fn get_operation_data(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(op) = state.db.operation_repo().get(id).await? else {
        return Ok(not_found_response(id));
    };

    if op.status != OperationStatus::Success {
        return Err(ApiError(ScrapeError::NotFound(format!(
            "operation {id} has no result data (status: {})",
            op.status
        ))));
    }

    // Inline payload wins; the result file is the fallback.
    if let Some(data) = op.scraped_data {
        return Ok(axum::Json(OperationDataResponse {
            success: true,
            source: "inline".to_string(),
            data,
        })
        .into_response());
    }
    if let Some(path) = &op.data_file {
        let data = state.results.read(path).await?;
        return Ok(axum::Json(OperationDataResponse {
            success: true,
            source: "file".to_string(),
            data,
        })
        .into_response());
    }

    Err(ApiError(ScrapeError::NotFound(format!(
        "operation {id} has no inline data and no result file"
    ))))
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/processor/status",
    responses(
        (status = 200, description = "Processor status", body = ProcessorStatusResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.processor.status().await?;
    Ok(axum::Json(ProcessorStatusResponse::from(status)))
}

#[utoipa::path(
    post,
    path = "/v1/processor/start",
    responses(
        (status = 200, description = "Processor started (or already running)", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = state.processor.start();
    let message = if started {
        "Processor started"
    } else {
        "Processor already running"
    };
    axum::Json(MessageResponse::new(message))
}

#[utoipa::path(
    post,
    path = "/v1/processor/stop",
    responses(
        (status = 200, description = "Processor stopped", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.processor.stop().await;
    axum::Json(MessageResponse::new("Processor stopped"))
}

#[utoipa::path(
    post,
    path = "/v1/processor/trigger",
    responses(
        (status = 200, description = "Pass executed", body = PassSummaryResponse),
        (status = 400, description = "Processor not running", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_trigger(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.processor.trigger().await?;
    Ok(axum::Json(PassSummaryResponse::from(summary)))
}

#[utoipa::path(
    post,
    path = "/v1/processor/retry-failed",
    responses(
        (status = 200, description = "Per-operation retry outcomes", body = RetryReportResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_retry_failed(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let outcomes = state.processor.retry_failed().await?;
    Ok(axum::Json(RetryReportResponse {
        success: true,
        attempted: outcomes.len(),
        outcomes: outcomes.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/processor/cleanup",
    request_body = CleanupBody,
    responses(
        (status = 200, description = "Deleted operation ids", body = CleanupResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_cleanup(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CleanupBody>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.processor.cleanup_old(body.days_old).await?;
    Ok(axum::Json(CleanupResponse {
        success: true,
        count: deleted.len(),
        deleted,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/processor/interval",
    request_body = IntervalBody,
    responses(
        (status = 200, description = "Interval updated", body = MessageResponse),
        (status = 400, description = "Interval below minimum", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "processor"
)]
pub async fn processor_interval(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<IntervalBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .processor
        .set_interval(std::time::Duration::from_millis(body.interval_ms))?;
    Ok(axum::Json(MessageResponse::new(format!(
        "Polling interval set to {} ms",
        body.interval_ms
    ))))
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/logs",
    request_body = CreateLogBody,
    responses(
        (status = 201, description = "Log entry created", body = LogResponse),
        (status = 400, description = "Validation failure", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "logs"
)]
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<CreateLogBody>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = NewLogEntry {
        logged_at: body.logged_at,
        platform: body.platform,
        kind: parse_kind(&body.kind)?,
        url: body.url,
        category: body.category,
        status: parse_status(&body.status)?,
        action: body.action.unwrap_or_else(|| "Manual".to_string()),
        operation_id: body.operation_id,
    };
    let created = state.db.log_repo().append(entry).await?;
    Ok((StatusCode::CREATED, axum::Json(LogResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/v1/logs",
    params(ListLogsQuery),
    responses(
        (status = 200, description = "Log entries", body = LogListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "logs"
)]
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = LogFilter {
        platform: query.platform,
        status: query.status.as_deref().map(parse_status).transpose()?,
        kind: query.kind.as_deref().map(parse_kind).transpose()?,
        logged_after: query.from,
        logged_before: query.to,
    };
    let page = PageRequest {
        page: query.page.unwrap_or(1).max(1),
        limit: query.limit.unwrap_or(20).min(100),
    };

    let result = state.db.log_repo().list(&filter, &page).await?;

    Ok(axum::Json(LogListResponse {
        success: true,
        logs: result.items.into_iter().map(LogResponse::from).collect(),
        total: result.total,
        page: page.page,
        limit: page.limit,
    }))
}

#[utoipa::path(
    patch,
    path = "/v1/logs/{id}",
    params(("id" = Uuid, Path, description = "Log entry ID")),
    request_body = UpdateLogBody,
    responses(
        (status = 200, description = "Log entry updated", body = LogResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "logs"
)]
pub async fn update_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<crate::dto::UpdateLogBody>,
) -> Result<impl IntoResponse, ApiError> {
    let status = parse_status(&body.status)?;
    let action = body.action.unwrap_or_else(|| "Manual".to_string());
    match state.db.log_repo().update_entry(id, status, &action).await? {
        Some(updated) => Ok(axum::Json(LogResponse::from(updated)).into_response()),
        None => {
            let body = ErrorResponse {
                success: false,
                error: "not_found".to_string(),
                message: format!("Log entry not found: {id}"),
            };
            Ok((StatusCode::NOT_FOUND, axum::Json(body)).into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/logs/stats",
    params(LogStatsQuery),
    responses(
        (status = 200, description = "Log statistics with daily series", body = LogStatsResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "logs"
)]
pub async fn log_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogStatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.db.log_repo().stats(query.from, query.to).await?;
    Ok(axum::Json(LogStatsResponse::from(stats)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}
