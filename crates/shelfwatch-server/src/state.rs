use shelfwatch_client::PageFetcher;
use shelfwatch_core::{FileResultStore, JobProcessor};
use shelfwatch_db::{Database, LogRepository, OperationRepository};

/// The concrete processor wired into the server.
pub type AppProcessor =
    JobProcessor<PageFetcher, OperationRepository, LogRepository, FileResultStore>;

/// Shared application state, available to all route handlers via
/// `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub processor: AppProcessor,
    pub results: FileResultStore,
    pub api_key: String,
}
