use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "shelfwatch API",
        version = "0.4.0",
        description = "Marketplace scraping job engine: operations, processor control, and audit logs."
    ),
    paths(
        crate::routes::create_operation,
        crate::routes::list_operations,
        crate::routes::operation_stats,
        crate::routes::get_operation,
        crate::routes::cancel_operation,
        crate::routes::start_operation,
        crate::routes::complete_operation,
        crate::routes::fail_operation,
        crate::routes::retry_operation,
        crate::routes::get_operation_data,
        crate::routes::processor_status,
        crate::routes::processor_start,
        crate::routes::processor_stop,
        crate::routes::processor_trigger,
        crate::routes::processor_retry_failed,
        crate::routes::processor_cleanup,
        crate::routes::processor_interval,
        crate::routes::create_log,
        crate::routes::list_logs,
        crate::routes::update_log,
        crate::routes::log_stats,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CreateOperationBody,
        crate::dto::OperationResponse,
        crate::dto::OperationEnvelope,
        crate::dto::OperationListResponse,
        crate::dto::OperationStatsResponse,
        crate::dto::OperationDataResponse,
        crate::dto::CompleteOperationBody,
        crate::dto::FailOperationBody,
        crate::dto::ProgressDto,
        crate::dto::StatusCountsDto,
        crate::dto::SellerStatsDto,
        crate::dto::ProcessorStatusResponse,
        crate::dto::PassSummaryResponse,
        crate::dto::RetryOutcomeDto,
        crate::dto::RetryReportResponse,
        crate::dto::CleanupBody,
        crate::dto::CleanupResponse,
        crate::dto::IntervalBody,
        crate::dto::MessageResponse,
        crate::dto::CreateLogBody,
        crate::dto::LogResponse,
        crate::dto::LogListResponse,
        crate::dto::UpdateLogBody,
        crate::dto::DailyCountDto,
        crate::dto::LogStatsResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "operations", description = "Scraping operation lifecycle"),
        (name = "processor", description = "Background processor control"),
        (name = "logs", description = "Audit trail"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API key. Set via SHELFWATCH_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
