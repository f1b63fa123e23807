use std::future::Future;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::operation::OperationConfig;

/// Per-call fetch settings, derived from an operation's config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub use_browser: bool,
    pub timeout: Duration,
    /// Extra settle time after the page reports ready (browser only).
    pub wait_time: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        OperationConfig::default().into()
    }
}

impl From<OperationConfig> for FetchConfig {
    fn from(config: OperationConfig) -> Self {
        Self {
            use_browser: config.use_browser,
            timeout: config.timeout(),
            wait_time: config.wait_time(),
        }
    }
}

/// Acquires raw page content for a URL.
///
/// Implementations are swappable per call via `config` (plain HTTP vs.
/// rendered); any session pooling they do is an optimization, not a
/// correctness requirement.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
    ) -> impl Future<Output = Result<String, ScrapeError>> + Send;
}
