use scraper::Html;

use shelfwatch_core::adapter::SiteAdapter;
use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::product::{ProductRecord, discount_percent};

use super::{parse_price, sel, text_of};

/// PharmEasy medicine pages. CSS-module class names carry a content
/// hash suffix, so selectors match on the stable prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct PharmEasyAdapter;

impl PharmEasyAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SiteAdapter for PharmEasyAdapter {
    fn scrape_product(&self, content: &str) -> Result<ProductRecord, ScrapeError> {
        let doc = Html::parse_document(content);

        let title = doc
            .select(&sel("h1[class*='MedicineOverviewSection_medicineName']")?)
            .map(text_of)
            .find(|t| !t.is_empty())
            .ok_or_else(|| ScrapeError::Extraction("medicine name not found".to_string()))?;

        let price = doc
            .select(&sel("div[class*='PriceInfo_ourPrice'], span[class*='PriceInfo_ourPrice']")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));
        let mrp = doc
            .select(&sel("span[class*='PriceInfo_striked']")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));

        let manufacturer = doc
            .select(&sel("div[class*='MedicineOverviewSection_brandName']")?)
            .next()
            .map(text_of)
            .filter(|m| !m.is_empty());

        let pack_size = doc
            .select(&sel("div[class*='MedicineOverviewSection_measurementUnit']")?)
            .next()
            .map(text_of)
            .filter(|p| !p.is_empty());

        let in_stock = !content.contains("NOTIFY ME") && !content.contains("Out of Stock");

        let mut record = ProductRecord::new(title);
        record.brand = manufacturer;
        record.price = price;
        record.mrp = mrp;
        record.discount_percent = match (price, mrp) {
            (Some(p), Some(m)) => discount_percent(p, m),
            _ => None,
        };
        record.currency = Some("INR".to_string());
        record.in_stock = Some(in_stock);
        if let Some(pack) = pack_size {
            record.extra = serde_json::json!({ "pack_size": pack });
        }
        Ok(record)
    }
}
