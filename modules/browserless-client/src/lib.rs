pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Puppeteer `waitUntil` condition passed through `gotoOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaitUntil {
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: WaitUntil,
    timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    wait_until: WaitUntil,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Build a client whose navigation and HTTP round-trip are both bounded by `timeout`.
    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        // Leave headroom over the in-browser navigation timeout so Browserless
        // reports its own error before the HTTP request is cut off.
        let client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(5))
            .build()
            .map_err(|e| BrowserlessError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
            wait_until: WaitUntil::NetworkIdle2,
        })
    }

    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let endpoint = format!("{}/content", self.base_url);

        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: self.wait_until,
                timeout: self.timeout.as_millis() as u64,
            },
        };

        debug!(url, wait_until = ?self.wait_until, "Browserless content request");

        let mut request = self.client.post(&endpoint).json(&body);
        if let Some(ref token) = self.token {
            request = request.query(&[("token", token.as_str())]);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BrowserlessError::Timeout(self.timeout.as_secs())
            } else {
                BrowserlessError::from(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_goto_options() {
        let body = ContentRequest {
            url: "https://shop.example/p/1",
            goto_options: GotoOptions {
                wait_until: WaitUntil::NetworkIdle2,
                timeout: 30_000,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["url"], "https://shop.example/p/1");
        assert_eq!(value["gotoOptions"]["waitUntil"], "networkidle2");
        assert_eq!(value["gotoOptions"]["timeout"], 30_000);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BrowserlessClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
