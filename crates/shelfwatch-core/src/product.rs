use serde::{Deserialize, Serialize};

/// Structured data extracted from a single product page.
///
/// Every field except `title` is optional — sites differ wildly in what
/// they expose, and adapters fill in what they can find. Per-site
/// oddities that don't fit the common shape go into `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Maximum retail price (the struck-through list price).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl ProductRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            brand: None,
            price: None,
            mrp: None,
            discount_percent: None,
            currency: None,
            rating: None,
            rating_count: None,
            in_stock: None,
            image_urls: Vec::new(),
            description: None,
            url: None,
            extra: serde_json::Value::Null,
        }
    }
}

/// Result of a category-page scrape: the products found on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPage {
    pub products: Vec<ProductRecord>,
}

/// Compute a discount percentage from selling price and MRP.
///
/// Returns `None` unless `0 < price <= mrp`.
pub fn discount_percent(price: f64, mrp: f64) -> Option<u32> {
    if price <= 0.0 || mrp <= 0.0 || price > mrp {
        return None;
    }
    Some((((mrp - price) / mrp) * 100.0).round() as u32)
}
