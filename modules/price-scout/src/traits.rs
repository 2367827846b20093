// Collaborator seams for the price discovery pipeline.
//
// Every external system the pipeline touches sits behind one of these traits
// and is handed in as `Arc<dyn Trait>`, so the pipeline can be driven
// end-to-end with the mocks in `testing` (no network, no browser).

use std::time::Duration;

use ai_client::{Agent, OpenAi, PromptBuilder};
use anyhow::Result;
use async_trait::async_trait;
use serpapi_client::{SearchParams, SearchResponse, SerpApiClient, SerpApiError};

use price_scout_common::{CandidateUrls, ExtractionOutcome};

// ---------------------------------------------------------------------------
// LanguageModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-text completion of a single user prompt.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Schema-constrained completion. Returns the raw JSON text; callers
    /// validate it against their own type.
    async fn extract_json(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<String>;
}

#[async_trait]
impl LanguageModel for OpenAi {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.prompt(prompt).temperature(temperature).send().await
    }

    async fn extract_json(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        self.structured_output(system, user, schema).await
    }
}

// ---------------------------------------------------------------------------
// SearchBackend
// ---------------------------------------------------------------------------

/// Raw categorized web search. Errors keep their type so the caller can tell
/// transient failures from permanent ones.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, SerpApiError>;
}

#[async_trait]
impl SearchBackend for SerpApiClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, SerpApiError> {
        SerpApiClient::search(self, params).await
    }
}

// ---------------------------------------------------------------------------
// UrlDiscovery
// ---------------------------------------------------------------------------

/// Turns a search phrase into candidate product pages. Never fails: a
/// provider problem is an empty set, which the pipeline reports.
#[async_trait]
pub trait UrlDiscovery: Send + Sync {
    async fn discover(&self, query: &str, country: &str) -> CandidateUrls;
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// PageRenderer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Fetch a page with its scripts executed and return readable text.
    /// An empty string means the page rendered but had no content.
    async fn render(&self, url: &str) -> Result<String>;
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// PriceExtractor
// ---------------------------------------------------------------------------

/// One extraction strategy. All failure modes come back as an outcome.
#[async_trait]
pub trait PriceExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> ExtractionOutcome;
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Headless browser
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start an isolated browser session. The caller owns it and must `close` it.
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the network to settle.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for `selector` to appear and return the element's text.
    async fn wait_for_text(&mut self, selector: &str, timeout: Duration) -> Result<String>;

    /// Release the browser process and its profile. Safe to call twice.
    async fn close(&mut self) -> Result<()>;
}
