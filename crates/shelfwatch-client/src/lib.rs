//! Fetch layer and bundled site adapters for shelfwatch.

pub mod adapters;
#[cfg(feature = "browser")]
pub mod browser;
pub mod fetcher;

pub use adapters::{FlipkartAdapter, MyntraAdapter, PharmEasyAdapter, default_registry};
#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use fetcher::{HttpFetcher, PageFetcher};
