use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;

use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::traits::{FetchConfig, Fetcher};

/// Headless-browser fetcher using Chromium via the Chrome DevTools Protocol.
///
/// Unlike [`super::HttpFetcher`], this renders JavaScript before
/// returning the HTML, which the SPA-heavy marketplaces need. A single
/// Chromium process is shared across all clones of this struct; each
/// fetch opens a new tab and closes it on every exit path — success,
/// error, or timeout — so long processor runs never leak sessions.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
}

impl BrowserFetcher {
    /// Launches a headless Chromium browser.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH` (or the
    /// default locations checked by `chromiumoxide`).
    pub async fn new() -> Result<Self, ScrapeError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags (--headless, --disable-gpu, …). Try to locate
        // the real binary buried inside the snap, falling back to any
        // other Chrome/Chromium install.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| ScrapeError::Config(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Config(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// On systems where Chromium is installed via **snap**, the wrapper
    /// at `/snap/bin/chromium` strips unknown CLI flags, breaking
    /// headless mode. Look for the real binary inside the snap first,
    /// then fall back to well-known system paths. If nothing is found,
    /// return `None` and let `chromiumoxide` do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            // Snap (Ubuntu default)
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            // Flatpak
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            // Common apt / manual installs
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        // Also honour an explicit override via env var.
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, config: &FetchConfig) -> Result<String, ScrapeError> {
        // Created outside the timeout so it can be closed even when the
        // navigation inside times out.
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Fetch(format!("Failed to open tab: {e}")))?;

        let result = tokio::time::timeout(config.timeout, async {
            page.goto(url)
                .await
                .map_err(|e| ScrapeError::Fetch(format!("Failed to navigate to {url}: {e}")))?;

            // Prefer a fully settled navigation; if that stalls, a present
            // <body> is the looser signal that the page rendered.
            if page.wait_for_navigation().await.is_err() {
                page.find_element("body").await.map_err(|e| {
                    ScrapeError::Fetch(format!("Page did not render body: {e}"))
                })?;
            }

            // Give client-side rendering time to settle.
            tokio::time::sleep(config.wait_time).await;

            page.content()
                .await
                .map_err(|e| ScrapeError::Fetch(format!("Failed to read page content: {e}")))
        })
        .await;

        let _ = page.close().await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ScrapeError::Timeout(config.timeout.as_millis() as u64)),
        }
    }
}
