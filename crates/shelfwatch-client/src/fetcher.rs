use std::net::IpAddr;

use reqwest::Client;
use url::Url;

use shelfwatch_core::error::ScrapeError;
use shelfwatch_core::traits::{FetchConfig, Fetcher};

/// User agent sent with plain HTTP fetches. Marketplaces serve stripped
/// or blocked pages to obvious bots, so this mimics a desktop browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// HTTP fetcher using reqwest.
///
/// Downloads raw HTML with a browser User-Agent and the per-operation
/// timeout. By default, SSRF protection is **enabled** — requests to
/// private/reserved IP ranges are blocked, since fetch targets come
/// from user submissions. Use
/// [`allow_private_urls`](Self::allow_private_urls) to disable this
/// (e.g., for CLI usage where the user controls the machine).
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    ssrf_protection: bool,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, config: &FetchConfig) -> Result<String, ScrapeError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let timeout_ms = config.timeout.as_millis() as u64;
        let response = self
            .client
            .get(url)
            .timeout(config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Timeout(timeout_ms)
                } else if e.is_connect() {
                    ScrapeError::Fetch(format!("Connection failed: {e}"))
                } else {
                    ScrapeError::Fetch(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("Failed to read response body: {e}")))
    }
}

/// Fetcher that routes each call per the operation's config: rendered
/// in a headless browser when `use_browser` is set and a browser is
/// available, plain HTTP otherwise.
#[derive(Clone)]
pub struct PageFetcher {
    http: HttpFetcher,
    #[cfg(feature = "browser")]
    browser: Option<crate::browser::BrowserFetcher>,
}

impl PageFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            #[cfg(feature = "browser")]
            browser: None,
        }
    }

    #[cfg(feature = "browser")]
    pub fn with_browser(mut self, browser: crate::browser::BrowserFetcher) -> Self {
        self.browser = Some(browser);
        self
    }
}

impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str, config: &FetchConfig) -> Result<String, ScrapeError> {
        if config.use_browser {
            #[cfg(feature = "browser")]
            if let Some(browser) = &self.browser {
                return browser.fetch(url, config).await;
            }
            tracing::warn!(%url, "Browser rendering requested but unavailable, using plain HTTP");
        }
        self.http.fetch(url, config).await
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate a URL to prevent server-side request forgery (SSRF).
///
/// 1. Only allow `http` and `https` schemes.
/// 2. Resolve the hostname via DNS.
/// 3. Reject if any resolved IP is private/reserved.
async fn validate_url(url: &str) -> Result<(), ScrapeError> {
    let parsed = Url::parse(url).map_err(|e| ScrapeError::Fetch(format!("Invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ScrapeError::Fetch(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ScrapeError::Fetch("URL has no host".to_string()))?;

    // An IP literal can be checked without a lookup.
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(ScrapeError::Fetch(format!(
                "SSRF blocked: {host} resolves to private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port().unwrap_or(match parsed.scheme() {
        "https" => 443,
        _ => 80,
    });
    let addr = format!("{host}:{port}");
    let addrs: Vec<_> = tokio::net::lookup_host(&addr)
        .await
        .map_err(|e| ScrapeError::Fetch(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(ScrapeError::Fetch(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    for socket_addr in &addrs {
        if is_private_ip(socket_addr.ip()) {
            return Err(ScrapeError::Fetch(format!(
                "SSRF blocked: {host} resolves to private/reserved IP {}",
                socket_addr.ip()
            )));
        }
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()           // 127.0.0.0/8
                || v4.is_private()     // 10/8, 172.16/12, 192.168/16
                || v4.is_link_local()  // 169.254.0.0/16 (cloud metadata!)
                || v4.is_unspecified() // 0.0.0.0
                || v4.is_broadcast()   // 255.255.255.255
                || v4.is_documentation() // 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // 100.64.0.0/10 (CGN)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()       // ::1
                || v6.is_unspecified() // ::
                // fe80::/10 (link-local)
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                // fc00::/7 (unique local)
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                // IPv4-mapped IPv6 (::ffff:x.x.x.x) — check the embedded v4
                || match v6.to_ipv4_mapped() {
                    Some(v4) => is_private_ip(IpAddr::V4(v4)),
                    None => false,
                }
        }
    }
}
