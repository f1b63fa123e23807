//! Bundled site adapters.
//!
//! Each adapter is a pure CSS-selector parser over fetched page
//! content, tested against golden HTML fixtures. Selectors chase the
//! markup the sites currently serve plus the previous generation of
//! class names, since marketplaces rotate them; an adapter breaking is
//! an `Extraction` failure on the operation, never a crash.

mod flipkart;
mod myntra;
mod pharmeasy;

use std::sync::Arc;

use scraper::{ElementRef, Selector};

use shelfwatch_core::adapter::{AdapterRegistry, SiteAdapter};
use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::seller::Seller;

pub use flipkart::FlipkartAdapter;
pub use myntra::MyntraAdapter;
pub use pharmeasy::PharmEasyAdapter;

/// Registry with every bundled adapter registered.
///
/// Sellers without a bundled adapter stay unregistered: operations for
/// them fail per-operation with `AdapterNotFound` until an adapter is
/// registered at startup.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Seller::Flipkart, || {
        Arc::new(FlipkartAdapter::new()) as Arc<dyn SiteAdapter>
    });
    registry.register(Seller::Myntra, || {
        Arc::new(MyntraAdapter::new()) as Arc<dyn SiteAdapter>
    });
    registry.register(Seller::Pharmeasy, || {
        Arc::new(PharmEasyAdapter::new()) as Arc<dyn SiteAdapter>
    });
    registry
}

/// Parse a CSS selector, mapping failure to an extraction error.
pub(crate) fn sel(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|_| ScrapeError::Extraction(format!("invalid selector: {css}")))
}

/// Concatenated, trimmed text of an element.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract the first monetary amount from price text like
/// `"₹1,299.50"`, `"Rs. 450"`, or `"MRP ₹2,099"`.
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut cleaned = String::new();
    for c in text[start..].chars() {
        match c {
            '0'..='9' | '.' => cleaned.push(c),
            ',' => {}
            _ => break,
        }
    }
    cleaned.parse().ok()
}

/// Extract the first integer from count text like `"1,234 Ratings"`.
pub(crate) fn parse_count(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let mut cleaned = String::new();
    for c in text[start..].chars() {
        match c {
            '0'..='9' => cleaned.push(c),
            ',' => {}
            _ => break,
        }
    }
    cleaned.parse().ok()
}
