use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use browserless_client::BrowserlessClient;
use rand::Rng;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::traits::PageRenderer;

/// Reject anything that isn't a plain web page before handing it to a browser.
pub fn ensure_web_url(url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url).context("Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
    }
    Ok(parsed)
}

/// Readability extraction to markdown. Product pages are mostly chrome and
/// navigation; the model only needs the main content.
pub fn html_to_markdown(html: &[u8], url: Option<&str>) -> String {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    transform_content_input(input, &config)
}

// --- Browserless renderer ---

pub struct BrowserlessRenderer {
    client: BrowserlessClient,
}

impl BrowserlessRenderer {
    pub fn new(client: BrowserlessClient) -> Self {
        info!("Using BrowserlessRenderer");
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        ensure_web_url(url)?;
        info!(url, renderer = "browserless", "Rendering page");

        let html = self
            .client
            .content(url)
            .await
            .with_context(|| format!("Browserless render failed for {url}"))?;

        if html.trim().is_empty() {
            warn!(url, renderer = "browserless", "Empty page content");
            return Ok(String::new());
        }

        let text = html_to_markdown(html.as_bytes(), Some(url));
        info!(url, renderer = "browserless", bytes = text.len(), "Rendered");
        Ok(text)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// --- Local Chromium renderer ---

/// Each Chromium instance is heavy; more than a couple at once exhausts
/// small containers.
const MAX_CONCURRENT_CHROME: usize = 2;
const CHROME_MAX_ATTEMPTS: u32 = 3;
/// Delay before retry N is base * 3^N plus up to a second of jitter.
const CHROME_RETRY_BASE: Duration = Duration::from_secs(3);

/// Headless Chromium `--dump-dom`, then Readability. Used when no Browserless
/// endpoint is configured.
pub struct ChromeRenderer {
    semaphore: Semaphore,
    chrome_bin: String,
    timeout: Duration,
}

enum ChromeRun {
    Done(Vec<u8>),
    Retry(&'static str),
}

impl ChromeRenderer {
    pub fn new(chrome_bin: Option<&str>, timeout: Duration) -> Self {
        let chrome_bin = chrome_bin.unwrap_or("chromium").to_string();
        info!(
            chrome_bin,
            max_concurrent = MAX_CONCURRENT_CHROME,
            "Using ChromeRenderer (dump-dom + Readability)"
        );
        Self {
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
            chrome_bin,
            timeout,
        }
    }

    async fn run_once(&self, url: &str) -> Result<ChromeRun> {
        let tmp_dir = tempfile::tempdir().context("Failed to create temp profile dir")?;
        let profile = format!("--user-data-dir={}", tmp_dir.path().display());

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.chrome_bin)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    &profile,
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                if output.stdout.is_empty() {
                    Ok(ChromeRun::Retry("Chrome returned empty DOM"))
                } else {
                    Ok(ChromeRun::Done(output.stdout))
                }
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if is_resource_exhaustion(&stderr) {
                    return Ok(ChromeRun::Retry("Chrome cannot fork"));
                }
                warn!(url, renderer = "chrome", stderr = %stderr, "Chrome exited with error");
                anyhow::bail!("Chrome exited with {}: {}", output.status, stderr.trim())
            }
            Ok(Err(e)) if is_resource_exhaustion(&e.to_string()) => {
                Ok(ChromeRun::Retry("Chrome launch failed"))
            }
            Ok(Err(e)) => anyhow::bail!("Failed to run Chrome for {url}: {e}"),
            Err(_) => Ok(ChromeRun::Retry("Chrome timed out")),
        }
    }

    async fn dump_dom(&self, url: &str) -> Result<Vec<u8>> {
        for attempt in 0..CHROME_MAX_ATTEMPTS {
            let reason = match self.run_once(url).await? {
                ChromeRun::Done(html) => return Ok(html),
                ChromeRun::Retry(reason) => reason,
            };

            if attempt + 1 == CHROME_MAX_ATTEMPTS {
                if reason == "Chrome timed out" {
                    anyhow::bail!("Chrome timed out after {}s for {url}", self.timeout.as_secs());
                }
                anyhow::bail!("{reason} after {CHROME_MAX_ATTEMPTS} attempts for {url}");
            }

            let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
            let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
            warn!(
                url,
                attempt = attempt + 1,
                backoff_secs = backoff.as_secs(),
                "{reason}, retrying after backoff"
            );
            tokio::time::sleep(backoff + jitter).await;
        }

        anyhow::bail!("Chrome made no attempts for {url}")
    }
}

fn is_resource_exhaustion(msg: &str) -> bool {
    msg.contains("Cannot fork") || msg.contains("Resource temporarily unavailable")
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        ensure_web_url(url)?;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Chrome semaphore closed"))?;

        info!(url, renderer = "chrome", "Rendering page");
        let html = self.dump_dom(url).await?;
        let text = html_to_markdown(&html, Some(url));
        if text.trim().is_empty() {
            warn!(url, renderer = "chrome", "Empty content after Readability extraction");
            return Ok(String::new());
        }

        info!(url, renderer = "chrome", bytes = text.len(), "Rendered");
        Ok(text)
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::testing::fake_chrome;

    #[test]
    fn ensure_web_url_accepts_http_and_https() {
        assert!(ensure_web_url("https://shop.example.com/p/1").is_ok());
        assert!(ensure_web_url("http://shop.example.com/p/1").is_ok());
    }

    #[test]
    fn ensure_web_url_rejects_other_schemes() {
        assert!(ensure_web_url("file:///etc/passwd").is_err());
        assert!(ensure_web_url("javascript:alert(1)").is_err());
        assert!(ensure_web_url("not a url").is_err());
    }

    #[test]
    fn html_to_markdown_keeps_visible_price_text() {
        let html = br#"<html><head><title>Phone</title></head><body>
            <article><h1>iPhone 16 Pro 128GB</h1>
            <p>The new iPhone 16 Pro is available today in four finishes.
            Order now and get it delivered tomorrow. Price: $999.00 including VAT.</p>
            </article></body></html>"#;
        let text = html_to_markdown(html, Some("https://shop.example.com/iphone"));
        assert!(text.contains("$999.00"), "got: {text}");
    }

    #[test]
    fn resource_exhaustion_is_detected() {
        assert!(is_resource_exhaustion("ERROR: Cannot fork zygote"));
        assert!(is_resource_exhaustion("Resource temporarily unavailable (os error 11)"));
        assert!(!is_resource_exhaustion("net::ERR_NAME_NOT_RESOLVED"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chrome_non_zero_exit_is_a_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_chrome(dir.path(), "echo 'net::ERR_NAME_NOT_RESOLVED' >&2\nexit 1");
        let renderer = ChromeRenderer::new(Some(&bin), Duration::from_secs(5));

        let err = renderer
            .render("https://no-such-host.example/p/1")
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("Chrome exited with"), "got: {err}");
        assert!(err.contains("net::ERR_NAME_NOT_RESOLVED"), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chrome_that_prints_a_page_renders_it() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_chrome(
            dir.path(),
            "echo '<html><body><article><h1>Kettle</h1><p>A stainless steel kettle \
             that boils a full litre in under three minutes. Now only $39.99 with \
             free delivery on every order.</p></article></body></html>'",
        );
        let renderer = ChromeRenderer::new(Some(&bin), Duration::from_secs(5));

        let text = renderer.render("https://shop.example.com/kettle").await.unwrap();
        assert!(text.contains("$39.99"), "got: {text}");
    }

    #[tokio::test]
    async fn chrome_renderer_rejects_non_web_urls_before_launching() {
        let renderer = ChromeRenderer::new(Some("/nonexistent/chromium"), Duration::from_secs(1));
        let err = renderer.render("ftp://example.com/file").await.unwrap_err();
        assert!(err.to_string().contains("http/https"));
    }
}
