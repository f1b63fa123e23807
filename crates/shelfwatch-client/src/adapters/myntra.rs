use scraper::Html;

use shelfwatch_core::adapter::SiteAdapter;
use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::product::{ProductRecord, discount_percent};

use super::{parse_count, parse_price, sel, text_of};

/// Myntra product pages (fashion). Product-only: category listings are
/// rendered client-side, so category operations fall back to the
/// engine's generic link strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct MyntraAdapter;

impl MyntraAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SiteAdapter for MyntraAdapter {
    fn scrape_product(&self, content: &str) -> Result<ProductRecord, ScrapeError> {
        let doc = Html::parse_document(content);

        let brand = doc
            .select(&sel("h1.pdp-title")?)
            .next()
            .map(text_of)
            .filter(|b| !b.is_empty());
        let name = doc
            .select(&sel("h1.pdp-name")?)
            .next()
            .map(text_of)
            .filter(|n| !n.is_empty());

        let title = match (&brand, &name) {
            (Some(brand), Some(name)) => format!("{brand} {name}"),
            (None, Some(name)) => name.clone(),
            (Some(brand), None) => brand.clone(),
            (None, None) => {
                return Err(ScrapeError::Extraction("product title not found".to_string()));
            }
        };

        let price = doc
            .select(&sel("span.pdp-price strong, span.pdp-price")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));
        let mrp = doc
            .select(&sel("span.pdp-mrp s")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));

        let rating = doc
            .select(&sel("div.index-overallRating div")?)
            .next()
            .and_then(|el| text_of(el).parse::<f64>().ok());
        let rating_count = doc
            .select(&sel("div.index-ratingsCount")?)
            .next()
            .and_then(|el| parse_count(&text_of(el)));

        let image_urls: Vec<String> = doc
            .select(&sel("div.image-grid-image, img.image-grid-imageV2")?)
            .filter_map(|el| {
                el.value().attr("src").map(str::to_string).or_else(|| {
                    // Grid tiles carry the image as an inline background.
                    el.value()
                        .attr("style")
                        .and_then(extract_background_url)
                })
            })
            .collect();

        let mut record = ProductRecord::new(title);
        record.brand = brand;
        record.price = price;
        record.mrp = mrp;
        record.discount_percent = match (price, mrp) {
            (Some(p), Some(m)) => discount_percent(p, m),
            _ => None,
        };
        record.currency = Some("INR".to_string());
        record.rating = rating;
        record.rating_count = rating_count;
        record.in_stock = Some(!content.contains("SOLD OUT"));
        record.image_urls = image_urls;
        Ok(record)
    }
}

/// Pull the URL out of `background-image: url("…")`.
fn extract_background_url(style: &str) -> Option<String> {
    let start = style.find("url(")? + 4;
    let end = style[start..].find(')')? + start;
    Some(style[start..end].trim_matches(['"', '\'']).to_string())
}
