use thiserror::Error;

/// Application-wide error types for shelfwatch.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Bad input to a submission or update (user-correctable).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A state-machine precondition was violated (e.g. starting a
    /// non-pending operation, retrying past the retry limit).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A conflicting record already exists (duplicate active URL).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation, log entry, or result file not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No scraper adapter is registered for the seller.
    #[error("No adapter registered for seller '{0}'")]
    AdapterNotFound(String),

    /// Page download failed (network, 4xx/5xx, render failure).
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Fetch exceeded the operation's configured timeout.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Adapter failed to extract structured data from the page.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Store write/read failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bad environment or startup configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Machine-usable error code for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Validation(_) => "validation_error",
            ScrapeError::InvalidTransition(_) => "invalid_transition",
            ScrapeError::Conflict(_) => "conflict",
            ScrapeError::NotFound(_) => "not_found",
            ScrapeError::AdapterNotFound(_) => "adapter_not_found",
            ScrapeError::Fetch(_) => "fetch_error",
            ScrapeError::Timeout(_) => "timeout",
            ScrapeError::Extraction(_) => "extraction_error",
            ScrapeError::Persistence(_) => "persistence_error",
            ScrapeError::Serialization(_) => "serialization_error",
            ScrapeError::Config(_) => "config_error",
        }
    }

    /// Returns true for failures of the execution phase itself — the
    /// engine records these on the operation (`mark_failed`) before
    /// re-raising, instead of treating them as caller errors.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            ScrapeError::AdapterNotFound(_)
                | ScrapeError::Fetch(_)
                | ScrapeError::Timeout(_)
                | ScrapeError::Extraction(_)
        )
    }
}
