pub mod config;
pub mod database;
pub mod log_repository;
pub mod operation_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use log_repository::LogRepository;
pub use operation_repository::OperationRepository;
