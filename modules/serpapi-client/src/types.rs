use serde::{Deserialize, Serialize};

// --- Request ---

/// Query parameters for a `/search` call. The API key is appended by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    #[serde(rename = "q")]
    pub query: String,
    pub num: u32,
    pub engine: String,
    /// Interface language (`hl`).
    #[serde(rename = "hl")]
    pub language: String,
    /// Country to search from (`gl`), lowercase two-letter code.
    #[serde(rename = "gl")]
    pub country: String,
}

impl SearchParams {
    /// Google web search from `country` with English results.
    pub fn google(query: impl Into<String>, country: &str, num: u32) -> Self {
        Self {
            query: query.into(),
            num,
            engine: "google".to_string(),
            language: "en".to_string(),
            country: country.trim().to_lowercase(),
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

// --- Response ---

/// The parts of a SerpApi Google response the price scout reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub shopping_results: Vec<ShoppingResult>,
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    #[serde(default)]
    pub search_metadata: Option<SearchMetadata>,
    /// Present when SerpApi could not complete the search.
    #[serde(default)]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Links from shopping results followed by organic results, skipping
    /// entries without a non-empty link. Duplicates are kept.
    pub fn links(&self) -> impl Iterator<Item = &str> {
        let shopping = self.shopping_results.iter().filter_map(|r| r.link.as_deref());
        let organic = self.organic_results.iter().filter_map(|r| r.link.as_deref());
        shopping
            .chain(organic)
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    /// SerpApi reports an empty result page through the `error` field.
    pub fn is_no_results(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.contains("hasn't returned any results"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShoppingResult {
    pub position: Option<u32>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub source: Option<String>,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganicResult {
    pub position: Option<u32>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMetadata {
    pub id: Option<String>,
    pub status: Option<String>,
}
