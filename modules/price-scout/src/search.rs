use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serpapi_client::{SearchParams, SearchResponse, SerpApiError};
use tracing::{info, warn};

use price_scout_common::{CandidateUrls, SearchConfig};

use crate::traits::{SearchBackend, UrlDiscovery};

/// Delay before retry N is base * 3^N plus jitter.
const SEARCH_RETRY_BASE: Duration = Duration::from_secs(1);

/// Candidate discovery through categorized web search. Shopping listings come
/// first, then organic results, duplicates collapsed.
pub struct SearchProvider {
    backend: Arc<dyn SearchBackend>,
    num_results: u32,
    language: String,
    max_attempts: u32,
    retry_base: Duration,
}

impl SearchProvider {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &SearchConfig) -> Self {
        Self {
            backend,
            num_results: config.num_results,
            language: config.language.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_base: SEARCH_RETRY_BASE,
        }
    }

    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Never fails. A provider error is logged and yields an empty set.
    pub async fn search(&self, query: &str, country: &str, num_results: u32) -> CandidateUrls {
        let params = SearchParams::google(query, country, num_results).language(&self.language);

        let response = match self.search_with_retry(&params).await {
            Ok(response) => response,
            Err(e) => {
                warn!(query, country, error = %e, "Search failed, no candidates");
                return CandidateUrls::new();
            }
        };

        let urls: CandidateUrls = response.links().collect();
        info!(
            query,
            country,
            shopping = response.shopping_results.len(),
            organic = response.organic_results.len(),
            unique = urls.len(),
            "Search complete"
        );
        urls
    }

    async fn search_with_retry(
        &self,
        params: &SearchParams,
    ) -> Result<SearchResponse, SerpApiError> {
        let mut attempt = 0;
        loop {
            match self.backend.search(params).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let backoff = self.retry_base * 3u32.pow(attempt);
                    let jitter = if self.retry_base.is_zero() {
                        Duration::ZERO
                    } else {
                        Duration::from_millis(rand::rng().random_range(0..250))
                    };
                    warn!(
                        query = %params.query,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Search failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl UrlDiscovery for SearchProvider {
    async fn discover(&self, query: &str, country: &str) -> CandidateUrls {
        self.search(query, country, self.num_results).await
    }

    fn name(&self) -> &str {
        "search"
    }
}
