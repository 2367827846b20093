// Headless Chromium sessions over the DevTools protocol.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::traits::{BrowserLauncher, BrowserSession};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// No new resource requests for this long counts as network idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);
/// Each shutdown step gets this long before the process is left to Drop.
const CLOSE_STEP_TIMEOUT: Duration = Duration::from_secs(2);

const PAGE_STATE_JS: &str =
    "({ ready: document.readyState, resources: performance.getEntriesByType('resource').length })";

#[derive(Debug, Deserialize)]
struct PageState {
    ready: String,
    resources: u64,
}

/// Launches a fresh, throwaway Chromium for every session.
pub struct ChromiumLauncher {
    chrome_bin: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(chrome_bin: Option<&str>, request_timeout: Duration) -> Self {
        Self {
            chrome_bin: chrome_bin.map(PathBuf::from),
            request_timeout,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let profile = tempfile::tempdir().context("Failed to create temp profile dir")?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .user_data_dir(profile.path())
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--mute-audio");
        if let Some(bin) = &self.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = ?e, "Browser handler error");
                }
            }
        });

        debug!(profile = %profile.path().display(), "Chromium session started");
        Ok(Box::new(ChromiumSession {
            browser,
            handler,
            page: None,
            _profile: profile,
            closed: false,
        }))
    }
}

/// One browser process with at most one open page. The profile directory is
/// removed when the session is dropped.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    _profile: TempDir,
    closed: bool,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().ok_or_else(|| anyhow!("No page loaded"))
    }
}

/// Poll until the document has loaded and no new resources have been
/// requested for `NETWORK_QUIET`. Gives up quietly at `timeout`; a busy page
/// may still have its price element.
async fn wait_for_network_idle(page: &Page, timeout: Duration) {
    let start = Instant::now();
    let mut last_count = None;
    let mut quiet_since = Instant::now();

    while start.elapsed() < timeout {
        let state = match page.evaluate(PAGE_STATE_JS).await {
            Ok(result) => result.into_value::<PageState>().ok(),
            Err(_) => None,
        };

        if let Some(state) = state {
            if last_count != Some(state.resources) {
                last_count = Some(state.resources);
                quiet_since = Instant::now();
            } else if state.ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Network idle");
                return;
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    warn!(
        timeout_secs = timeout.as_secs(),
        "Network did not settle, proceeding anyway"
    );
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| anyhow!("Navigation timeout of {}ms exceeded", timeout.as_millis()))?
            .with_context(|| format!("Navigation to {url} failed"))?;

        let remaining = timeout.saturating_sub(start.elapsed());
        wait_for_network_idle(&page, remaining).await;

        info!(url, elapsed_ms = start.elapsed().as_millis() as u64, "Page loaded");
        self.page = Some(page);
        Ok(())
    }

    async fn wait_for_text(&mut self, selector: &str, timeout: Duration) -> Result<String> {
        let page = self.page()?;
        let start = Instant::now();

        loop {
            if let Ok(element) = page.find_element(selector).await {
                let text = element
                    .inner_text()
                    .await
                    .context("Failed to read element text")?
                    .unwrap_or_default();
                debug!(selector, elapsed_ms = start.elapsed().as_millis() as u64, "Selector found");
                return Ok(text);
            }
            if start.elapsed() >= timeout {
                bail!(
                    "Timeout {}ms exceeded waiting for selector '{selector}'",
                    timeout.as_millis()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(page) = self.page.take() {
            match tokio::time::timeout(CLOSE_STEP_TIMEOUT, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Failed to close page"),
                Err(_) => debug!("Page close timed out"),
            }
        }

        let result = match tokio::time::timeout(CLOSE_STEP_TIMEOUT, self.browser.close()).await {
            Ok(result) => result.map(|_| ()).context("Failed to close browser"),
            Err(_) => Err(anyhow!(
                "Browser close timed out after {}s",
                CLOSE_STEP_TIMEOUT.as_secs()
            )),
        };
        if result.is_ok() {
            match tokio::time::timeout(CLOSE_STEP_TIMEOUT, self.browser.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "Waiting for browser exit failed"),
                Err(_) => debug!("Browser did not exit after close"),
            }
        }
        self.handler.abort();

        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the process if close() never ran.
        self.handler.abort();
    }
}
