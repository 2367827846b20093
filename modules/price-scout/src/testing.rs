// Test mocks for the price discovery pipeline.
//
// One mock per trait boundary, all configured with builder methods and all
// recording their calls:
// - MockLanguageModel (LanguageModel): fixed completion, URL-keyed JSON
// - MockSearchBackend (SearchBackend): queued responses
// - MockDiscovery (UrlDiscovery): fixed URL list
// - MockRenderer (PageRenderer): URL→page text
// - MockExtractor (PriceExtractor): URL→outcome, optional per-URL delay
// - MockBrowserLauncher (BrowserLauncher): URL→element text, counts sessions
//
// `fake_chrome` writes a shell script that stands in for the Chromium binary.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serpapi_client::{
    OrganicResult, SearchParams, SearchResponse, SerpApiError, ShoppingResult,
};

use price_scout_common::{CandidateUrls, ExtractionOutcome};

use crate::traits::{
    BrowserLauncher, BrowserSession, LanguageModel, PageRenderer, PriceExtractor, SearchBackend,
    UrlDiscovery,
};

// ---------------------------------------------------------------------------
// MockLanguageModel
// ---------------------------------------------------------------------------

/// `complete` returns the configured text (or fails). `extract_json` finds
/// the registered URL mentioned in the user prompt and returns its JSON;
/// unregistered pages get an empty price.
pub struct MockLanguageModel {
    completion: std::result::Result<String, String>,
    delay: Option<Duration>,
    extractions: HashMap<String, String>,
    prompts: Mutex<Vec<String>>,
    extract_prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            completion: Err("MockLanguageModel: no completion configured".to_string()),
            delay: None,
            extractions: HashMap::new(),
            prompts: Mutex::new(Vec::new()),
            extract_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn completing(mut self, text: &str) -> Self {
        self.completion = Ok(text.to_string());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.completion = Err(message.to_string());
        self
    }

    /// Sleep before every answer, for timeout tests.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn on_extract(mut self, url: &str, json: &str) -> Self {
        self.extractions.insert(url.to_string(), json.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn complete_calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_prompts.lock().unwrap().len()
    }

    /// User prompts sent to `extract_json`.
    pub fn extract_prompts(&self) -> Vec<String> {
        self.extract_prompts.lock().unwrap().clone()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completion.clone().map_err(|e| anyhow!(e))
    }

    async fn extract_json(
        &self,
        _system: &str,
        user: &str,
        _schema: serde_json::Value,
    ) -> Result<String> {
        self.extract_prompts.lock().unwrap().push(user.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let json = self
            .extractions
            .iter()
            .find(|(url, _)| user.contains(url.as_str()))
            .map(|(_, json)| json.clone())
            .unwrap_or_else(|| r#"{"price":""}"#.to_string());
        Ok(json)
    }
}

// ---------------------------------------------------------------------------
// MockSearchBackend
// ---------------------------------------------------------------------------

/// Pops one queued result per call; an empty queue answers with no results.
pub struct MockSearchBackend {
    responses: Mutex<VecDeque<std::result::Result<SearchResponse, SerpApiError>>>,
    calls: Mutex<Vec<SearchParams>>,
}

impl MockSearchBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then_respond(self, response: SearchResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn then_fail(self, error: SerpApiError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<SearchParams> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    async fn search(
        &self,
        params: &SearchParams,
    ) -> std::result::Result<SearchResponse, SerpApiError> {
        self.calls.lock().unwrap().push(params.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchResponse::default()))
    }
}

/// Build a response from shopping and organic links.
pub fn search_response(shopping: &[&str], organic: &[&str]) -> SearchResponse {
    SearchResponse {
        shopping_results: shopping
            .iter()
            .map(|link| ShoppingResult {
                link: Some(link.to_string()),
                ..Default::default()
            })
            .collect(),
        organic_results: organic
            .iter()
            .map(|link| OrganicResult {
                link: Some(link.to_string()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// MockDiscovery
// ---------------------------------------------------------------------------

pub struct MockDiscovery {
    urls: Vec<String>,
    queries: Mutex<Vec<(String, String)>>,
}

impl MockDiscovery {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// `(query, country)` for every call.
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl UrlDiscovery for MockDiscovery {
    async fn discover(&self, query: &str, country: &str) -> CandidateUrls {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), country.to_string()));
        self.urls.iter().collect()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered URLs.
pub struct MockRenderer {
    pages: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failures: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn on_failure(mut self, url: &str, message: &str) -> Self {
        self.failures.insert(url.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failures.get(url) {
            bail!("{message}");
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("MockRenderer: no page registered for {url}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Unregistered URLs get the default outcome (`NotFound` unless changed).
pub struct MockExtractor {
    name: String,
    outcomes: HashMap<String, ExtractionOutcome>,
    delays: HashMap<String, Duration>,
    default: ExtractionOutcome,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcomes: HashMap::new(),
            delays: HashMap::new(),
            default: ExtractionOutcome::NotFound,
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn on_url(mut self, url: &str, outcome: ExtractionOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn by_default(mut self, outcome: ExtractionOutcome) -> Self {
        self.default = outcome;
        self
    }

    /// Hold the extraction of `url` for `delay` before answering.
    pub fn slow_on(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// URLs in the order they were extracted.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// URLs in the order their extraction finished.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> ExtractionOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.completed.lock().unwrap().push(url.to_string());
        self.outcomes
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// MockBrowserLauncher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BrowserCounters {
    launched: AtomicUsize,
    closed: AtomicUsize,
    dropped: AtomicUsize,
}

/// Sessions answer `wait_for_text` with the text registered for the URL they
/// navigated to; other URLs behave like a selector that never appears.
pub struct MockBrowserLauncher {
    prices: Arc<HashMap<String, String>>,
    navigation_failures: Arc<HashMap<String, String>>,
    launch_error: Option<String>,
    hang_on_close: bool,
    counters: Arc<BrowserCounters>,
}

impl MockBrowserLauncher {
    pub fn new() -> Self {
        Self {
            prices: Arc::new(HashMap::new()),
            navigation_failures: Arc::new(HashMap::new()),
            launch_error: None,
            hang_on_close: false,
            counters: Arc::new(BrowserCounters::default()),
        }
    }

    pub fn on_price(mut self, url: &str, text: &str) -> Self {
        Arc::make_mut(&mut self.prices).insert(url.to_string(), text.to_string());
        self
    }

    pub fn on_navigation_failure(mut self, url: &str, message: &str) -> Self {
        Arc::make_mut(&mut self.navigation_failures).insert(url.to_string(), message.to_string());
        self
    }

    pub fn failing_launch(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    /// Sessions whose `close` never completes, like a wedged browser.
    pub fn hanging_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }

    pub fn launched(&self) -> usize {
        self.counters.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Sessions that have been dropped, closed or not.
    pub fn dropped(&self) -> usize {
        self.counters.dropped.load(Ordering::SeqCst)
    }
}

impl Default for MockBrowserLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserLauncher for MockBrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if let Some(message) = &self.launch_error {
            bail!("{message}");
        }
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBrowserSession {
            prices: self.prices.clone(),
            navigation_failures: self.navigation_failures.clone(),
            counters: self.counters.clone(),
            hang_on_close: self.hang_on_close,
            current: None,
            closed: false,
        }))
    }
}

struct MockBrowserSession {
    prices: Arc<HashMap<String, String>>,
    navigation_failures: Arc<HashMap<String, String>>,
    counters: Arc<BrowserCounters>,
    hang_on_close: bool,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        if let Some(message) = self.navigation_failures.get(url) {
            bail!("{message}");
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_text(&mut self, selector: &str, timeout: Duration) -> Result<String> {
        let url = self
            .current
            .as_deref()
            .ok_or_else(|| anyhow!("no page loaded"))?;
        self.prices.get(url).cloned().ok_or_else(|| {
            anyhow!(
                "Timeout {}ms exceeded waiting for selector '{selector}'",
                timeout.as_millis()
            )
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockBrowserSession {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Fake Chromium binary
// ---------------------------------------------------------------------------

/// Write an executable `/bin/sh` script with `body` into `dir` and return its
/// path, for pointing `ChromeRenderer` at something other than a browser.
#[cfg(unix)]
pub fn fake_chrome(dir: &std::path::Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("chromium");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}
