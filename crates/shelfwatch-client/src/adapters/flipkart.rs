use scraper::Html;

use shelfwatch_core::adapter::SiteAdapter;
use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::product::{CategoryPage, ProductRecord, discount_percent};

use super::{parse_count, parse_price, sel, text_of};

/// Flipkart product and category pages.
///
/// Flipkart ships obfuscated, periodically rotated class names; every
/// selector therefore lists the current name first and the previous
/// generation after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlipkartAdapter;

impl FlipkartAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SiteAdapter for FlipkartAdapter {
    fn scrape_product(&self, content: &str) -> Result<ProductRecord, ScrapeError> {
        let doc = Html::parse_document(content);

        let title = doc
            .select(&sel("span.VU-ZEz, span.B_NuCI, h1 span")?)
            .map(text_of)
            .find(|t| !t.is_empty())
            .ok_or_else(|| ScrapeError::Extraction("product title not found".to_string()))?;

        let price = doc
            .select(&sel("div.Nx9bqj, div._30jeq3")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));
        let mrp = doc
            .select(&sel("div.yRaY8j, div._3I9_wc")?)
            .next()
            .and_then(|el| parse_price(&text_of(el)));

        let rating = doc
            .select(&sel("div.XQDdHH, div._3LWZlK")?)
            .next()
            .and_then(|el| text_of(el).parse::<f64>().ok());
        let rating_count = doc
            .select(&sel("span.Wphh3N, span._2_R_DZ")?)
            .next()
            .and_then(|el| parse_count(&text_of(el)));

        let image_urls: Vec<String> = doc
            .select(&sel("img.DByuf4, img._396cs4")?)
            .filter_map(|el| el.value().attr("src"))
            .map(str::to_string)
            .collect();

        let description = doc
            .select(&sel("div._1mXcCf")?)
            .next()
            .map(text_of)
            .filter(|d| !d.is_empty());

        let sold_out = content.contains("Sold Out") || content.contains("Currently unavailable");

        let mut record = ProductRecord::new(title);
        record.price = price;
        record.mrp = mrp;
        record.discount_percent = match (price, mrp) {
            (Some(p), Some(m)) => discount_percent(p, m),
            _ => None,
        };
        record.currency = Some("INR".to_string());
        record.rating = rating;
        record.rating_count = rating_count;
        record.in_stock = Some(!sold_out);
        record.image_urls = image_urls;
        record.description = description;
        Ok(record)
    }

    fn supports_category(&self) -> bool {
        true
    }

    fn scrape_category(&self, content: &str) -> Result<CategoryPage, ScrapeError> {
        let doc = Html::parse_document(content);
        let card_sel = sel("div[data-id]")?;
        let title_sel = sel("div.KzDlHZ, div._4rR01T, a.s1Q9rs, a.wjcEIp")?;
        let price_sel = sel("div.Nx9bqj, div._30jeq3")?;
        let rating_sel = sel("div.XQDdHH, div._3LWZlK")?;
        let link_sel = sel("a[href*='/p/']")?;

        let mut products = Vec::new();
        for card in doc.select(&card_sel) {
            let Some(title) = card
                .select(&title_sel)
                .map(text_of)
                .find(|t| !t.is_empty())
            else {
                continue;
            };

            let mut record = ProductRecord::new(title);
            record.price = card
                .select(&price_sel)
                .next()
                .and_then(|el| parse_price(&text_of(el)));
            record.currency = Some("INR".to_string());
            record.rating = card
                .select(&rating_sel)
                .next()
                .and_then(|el| text_of(el).parse::<f64>().ok());
            record.url = card
                .select(&link_sel)
                .filter_map(|el| el.value().attr("href"))
                .next()
                .map(str::to_string);
            products.push(record);
        }

        Ok(CategoryPage { products })
    }
}
