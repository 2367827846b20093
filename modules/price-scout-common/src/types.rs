use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{PriceScoutError, Result};

/// Price text recorded when a page was fetched but no price could be located.
pub const PRICE_NOT_FOUND: &str = "Price not found";

// --- Query ---

/// A product query as submitted by the caller. Both fields are kept exactly
/// as given so the response can echo them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub raw: String,
    pub country: String,
}

impl Query {
    /// Validate caller input. Blank values count as missing.
    pub fn new(raw: impl Into<String>, country: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let country = country.into();

        if raw.trim().is_empty() {
            return Err(PriceScoutError::MissingField("query"));
        }
        if country.trim().is_empty() {
            return Err(PriceScoutError::MissingField("country"));
        }

        Ok(Self { raw, country })
    }
}

// --- RefinedQuery ---

/// Where the search phrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefinementSource {
    /// Reformatted by the language model, marketing suffix appended.
    Llm,
    /// The model call failed; the raw query is used as-is.
    FallbackRaw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedQuery {
    pub text: String,
    pub source: RefinementSource,
}

impl RefinedQuery {
    pub fn from_llm(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: RefinementSource::Llm,
        }
    }

    pub fn fallback(raw: impl Into<String>) -> Self {
        Self {
            text: raw.into(),
            source: RefinementSource::FallbackRaw,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == RefinementSource::FallbackRaw
    }
}

// --- CandidateUrls ---

/// Product-page links discovered for one query. Duplicates and blank
/// entries are dropped; iteration follows first-insertion order so repeated
/// runs over the same search results process URLs identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateUrls {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl CandidateUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link. Returns `false` if it was blank or already present.
    pub fn insert(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || !self.seen.insert(url.to_string()) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

impl<S: AsRef<str>> FromIterator<S> for CandidateUrls {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut urls = Self::new();
        for url in iter {
            urls.insert(url.as_ref());
        }
        urls
    }
}

impl IntoIterator for CandidateUrls {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.into_iter()
    }
}

// --- PriceSchema ---

/// The structured answer requested from the language model: the literal
/// visible price text, with no currency normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PriceSchema {
    /// The visible price of the product.
    pub price: String,
}

impl PriceSchema {
    /// Accept model output only if it is exactly this schema with a
    /// non-blank price. Returns the trimmed price text.
    pub fn validate(json: &str) -> Option<String> {
        let parsed: PriceSchema = serde_json::from_str(json).ok()?;
        let price = parsed.price.trim();
        (!price.is_empty()).then(|| price.to_string())
    }
}

// --- ExtractionOutcome ---

/// Result of one extractor's attempt on one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success(String),
    NotFound,
    Error(String),
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExtractionOutcome::NotFound)
    }

    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionOutcome::Success(_) => "success",
            ExtractionOutcome::NotFound => "not_found",
            ExtractionOutcome::Error(_) => "error",
        }
    }
}

// --- ResultRecord / PipelineResponse ---

/// Per-URL entry in the response: a price, or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    pub fn priced(url: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            price: Some(price.into()),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            price: None,
            error: Some(error.into()),
        }
    }

    pub fn from_outcome(url: impl Into<String>, outcome: ExtractionOutcome) -> Self {
        match outcome {
            ExtractionOutcome::Success(price) => Self::priced(url, price),
            ExtractionOutcome::NotFound => Self::priced(url, PRICE_NOT_FOUND),
            ExtractionOutcome::Error(message) => Self::failed(url, message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub query: String,
    pub refined_query: String,
    pub country: String,
    pub results: Vec<ResultRecord>,
}

impl PipelineResponse {
    /// Records carrying an actual price (not the not-found sentinel).
    pub fn priced_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.price.as_deref().is_some_and(|p| p != PRICE_NOT_FOUND))
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}
