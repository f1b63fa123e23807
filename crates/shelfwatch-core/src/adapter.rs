use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ScrapeError;
use crate::product::{CategoryPage, ProductRecord};
use crate::seller::Seller;

/// Per-site extraction strategy.
///
/// Adapters are pure parsers: they receive already-fetched page content
/// and return structured records. Category extraction is optional;
/// callers must check [`supports_category`](Self::supports_category)
/// before invoking it, and fall back to the engine's generic strategy
/// otherwise.
pub trait SiteAdapter: Send + Sync {
    fn scrape_product(&self, content: &str) -> Result<ProductRecord, ScrapeError>;

    fn supports_category(&self) -> bool {
        false
    }

    fn scrape_category(&self, content: &str) -> Result<CategoryPage, ScrapeError> {
        let _ = content;
        Err(ScrapeError::Extraction(
            "adapter does not support category extraction".to_string(),
        ))
    }
}

/// Constructor for an adapter instance. Registered once at startup.
pub type AdapterFactory = Box<dyn Fn() -> Arc<dyn SiteAdapter> + Send + Sync>;

/// Maps sellers to their extraction strategy.
///
/// Factories are registered at construction time; the instance a factory
/// produces is cached for the process lifetime, so repeated resolutions
/// of the same seller reuse one adapter. Seller aliasing is handled
/// upstream by [`Seller::from_str`], which makes resolution here an
/// exact enum lookup.
pub struct AdapterRegistry {
    factories: HashMap<Seller, AdapterFactory>,
    cache: moka::sync::Cache<Seller, Arc<dyn SiteAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: moka::sync::Cache::new(Seller::ALL.len() as u64),
        }
    }

    /// Register a factory for a seller. Later registrations win.
    pub fn register<F>(&mut self, seller: Seller, factory: F)
    where
        F: Fn() -> Arc<dyn SiteAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(seller, Box::new(factory));
        self.cache.invalidate(&seller);
    }

    /// Register an already-built adapter (singleton form).
    pub fn register_instance(&mut self, seller: Seller, adapter: Arc<dyn SiteAdapter>) {
        self.register(seller, move || adapter.clone());
    }

    pub fn is_registered(&self, seller: Seller) -> bool {
        self.factories.contains_key(&seller)
    }

    /// Resolve the adapter for a seller, instantiating and caching it on
    /// first use. A missing adapter is a recoverable, per-operation
    /// condition — callers report it, they don't crash.
    pub fn resolve(&self, seller: Seller) -> Result<Arc<dyn SiteAdapter>, ScrapeError> {
        if let Some(adapter) = self.cache.get(&seller) {
            return Ok(adapter);
        }
        let factory = self
            .factories
            .get(&seller)
            .ok_or_else(|| ScrapeError::AdapterNotFound(seller.to_string()))?;
        let adapter = factory();
        self.cache.insert(seller, adapter.clone());
        tracing::debug!(seller = %seller, "Adapter resolved and cached");
        Ok(adapter)
    }
}
