//! Manual smoke test for the headless-browser fetcher.
//!
//! Run with: `cargo run -p shelfwatch-client --example browser_smoke --features browser`

use shelfwatch_client::{BrowserFetcher, HttpFetcher, PageFetcher};
use shelfwatch_core::traits::{FetchConfig, Fetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let browser = BrowserFetcher::new().await?;
    let fetcher = PageFetcher::new(HttpFetcher::new()?).with_browser(browser);

    let config = FetchConfig::default();
    let html = fetcher.fetch("https://example.com", &config).await?;
    println!("Fetched {} bytes of rendered HTML", html.len());
    println!("{}", &html[..html.len().min(300)]);

    Ok(())
}
