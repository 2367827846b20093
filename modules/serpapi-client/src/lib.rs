pub mod error;
pub mod types;

pub use error::{Result, SerpApiError};
pub use types::{OrganicResult, SearchMetadata, SearchParams, SearchResponse, ShoppingResult};

use std::time::Duration;

use tracing::debug;

const BASE_URL: &str = "https://serpapi.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SerpApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SerpApiError::Build(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Run one search. An empty result page is `Ok` with no results; any
    /// other error SerpApi reports in its body is a `SerpApiError::Search`.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse> {
        let url = format!("{}/search", self.base_url);

        debug!(query = %params.query, country = %params.country, num = params.num, "SerpApi search");

        let resp = self
            .client
            .get(&url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("output", "json")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SerpApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let response: SearchResponse = serde_json::from_str(&body)?;

        match response.error {
            Some(_) if response.is_no_results() => Ok(SearchResponse {
                error: None,
                ..response
            }),
            Some(message) => Err(SerpApiError::Search(message)),
            None => Ok(response),
        }
    }
}
