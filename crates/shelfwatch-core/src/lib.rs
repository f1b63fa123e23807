//! Core domain model and job machinery for shelfwatch: the operation
//! state machine, adapter registry, scrape engine, and the background
//! job processor. Everything I/O-shaped is behind a trait, implemented
//! by the client/db crates (or by `testutil` fakes in tests).

pub mod adapter;
pub mod engine;
pub mod error;
pub mod log;
pub mod operation;
pub mod processor;
pub mod product;
pub mod results;
pub mod seller;
pub mod store;
pub mod testutil;
pub mod traits;

pub use adapter::{AdapterRegistry, SiteAdapter};
pub use engine::ScrapeEngine;
pub use error::ScrapeError;
pub use operation::{
    CreateOperationRequest, OperationConfig, OperationKind, OperationStatus, ProcessorConfig,
    Progress, ScrapeOperation,
};
pub use processor::JobProcessor;
pub use product::{CategoryPage, ProductRecord};
pub use results::{FileResultStore, ResultStore};
pub use seller::Seller;
pub use store::OperationStore;
pub use traits::{FetchConfig, Fetcher};
