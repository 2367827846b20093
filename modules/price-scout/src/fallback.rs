use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use price_scout_common::{ExtractionOutcome, FallbackConfig};

use crate::renderer::ensure_web_url;
use crate::traits::{BrowserLauncher, BrowserSession, PriceExtractor};

/// Headroom on top of the session's own timeouts before we stop waiting on
/// it. Also bounds `close`; a session that doesn't close in time is dropped,
/// which kills its browser.
const SESSION_GRACE: Duration = Duration::from_secs(5);

/// Open the page in a fresh headless browser and read a fixed CSS selector.
/// Only works on sites that use that markup; it exists for pages the primary
/// extractor can't read. Never returns `NotFound`.
pub struct FallbackExtractor {
    launcher: Arc<dyn BrowserLauncher>,
    price_selector: String,
    navigation_timeout: Duration,
    selector_timeout: Duration,
    close_timeout: Duration,
}

impl FallbackExtractor {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &FallbackConfig) -> Self {
        Self {
            launcher,
            price_selector: config.price_selector.clone(),
            navigation_timeout: config.navigation_timeout(),
            selector_timeout: config.selector_timeout(),
            close_timeout: SESSION_GRACE,
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    async fn close(&self, mut session: Box<dyn BrowserSession>, url: &str) {
        match tokio::time::timeout(self.close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(url, error = %e, "Failed to close browser session"),
            Err(_) => warn!(
                url,
                timeout_ms = self.close_timeout.as_millis() as u64,
                "Browser session close timed out, dropping it"
            ),
        }
    }

    async fn read_price(&self, session: &mut dyn BrowserSession, url: &str) -> Result<String> {
        tokio::time::timeout(
            self.navigation_timeout + SESSION_GRACE,
            session.goto(url, self.navigation_timeout),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "Navigation timeout of {}ms exceeded",
                self.navigation_timeout.as_millis()
            )
        })??;

        tokio::time::timeout(
            self.selector_timeout + SESSION_GRACE,
            session.wait_for_text(&self.price_selector, self.selector_timeout),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "Timeout {}ms exceeded waiting for selector '{}'",
                self.selector_timeout.as_millis(),
                self.price_selector
            )
        })?
    }
}

#[async_trait]
impl PriceExtractor for FallbackExtractor {
    async fn extract(&self, url: &str) -> ExtractionOutcome {
        if let Err(e) = ensure_web_url(url) {
            return ExtractionOutcome::Error(format!("Price not found or error occurred: {e:#}"));
        }

        let launched = tokio::time::timeout(
            self.navigation_timeout + SESSION_GRACE,
            self.launcher.launch(),
        )
        .await;
        let mut session = match launched {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                warn!(url, error = %e, "Browser launch failed");
                return ExtractionOutcome::Error(format!("Browser launch failed: {e:#}"));
            }
            Err(_) => {
                warn!(url, "Browser launch timed out");
                return ExtractionOutcome::Error("Browser launch timed out".to_string());
            }
        };

        let result = self.read_price(session.as_mut(), url).await;
        self.close(session, url).await;

        match result {
            Ok(text) if !text.trim().is_empty() => {
                let price = text.trim().to_string();
                info!(url, price = %price, selector = %self.price_selector, "Price read from page");
                ExtractionOutcome::Success(price)
            }
            Ok(_) => {
                warn!(url, selector = %self.price_selector, "Price element was empty");
                ExtractionOutcome::Error(format!(
                    "Price element '{}' was empty",
                    self.price_selector
                ))
            }
            Err(e) => {
                warn!(url, error = %e, "Fallback extraction failed");
                ExtractionOutcome::Error(format!("Price not found or error occurred: {e:#}"))
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
