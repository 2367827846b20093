use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PriceScoutError, Result};

/// TOML-backed tunables. Every section is optional; an absent file or
/// section yields the defaults below. Secrets stay in the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScoutConfig {
    pub models: ModelsConfig,
    pub refine: RefineConfig,
    pub search: SearchConfig,
    pub extraction: ExtractionConfig,
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelsConfig {
    pub refine: String,
    pub extraction: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            refine: "gpt-4o".to_string(),
            extraction: "gpt-4o".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RefineConfig {
    pub temperature: f32,
    /// Appended to every model-refined phrase to bias search toward listings.
    pub suffix: String,
    pub timeout_secs: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            suffix: "buy online".to_string(),
            timeout_secs: 30,
        }
    }
}

impl RefineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    /// Web search provider (shopping + organic results).
    #[default]
    Search,
    /// Ask the language model for product URLs, falling back to search.
    Llm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SearchConfig {
    pub strategy: DiscoveryStrategy,
    pub num_results: u32,
    pub language: String,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: DiscoveryStrategy::Search,
            num_results: 5,
            language: "en".to_string(),
            max_attempts: 2,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExtractionConfig {
    /// Rendered pages with fewer words than this are not sent to the model.
    pub min_word_count: usize,
    pub max_content_chars: usize,
    pub render_timeout_secs: u64,
    pub model_timeout_secs: u64,
    /// URLs extracted at once. 1 processes them strictly in order.
    pub concurrency: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_word_count: 1,
            max_content_chars: 30_000,
            render_timeout_secs: 45,
            model_timeout_secs: 60,
            concurrency: 1,
        }
    }
}

impl ExtractionConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FallbackConfig {
    /// CSS selector of the site-specific price element.
    pub price_selector: String,
    pub navigation_timeout_secs: u64,
    pub selector_timeout_secs: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            price_selector: "span.as-price-currentprice".to_string(),
            navigation_timeout_secs: 30,
            selector_timeout_secs: 10,
        }
    }
}

impl FallbackConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }
}

impl ScoutConfig {
    /// Reject values that would make a run hang or do nothing.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("refine.timeout_secs", self.refine.timeout_secs),
            ("search.timeout_secs", self.search.timeout_secs),
            ("search.num_results", u64::from(self.search.num_results)),
            ("search.max_attempts", u64::from(self.search.max_attempts)),
            ("extraction.render_timeout_secs", self.extraction.render_timeout_secs),
            ("extraction.model_timeout_secs", self.extraction.model_timeout_secs),
            ("extraction.concurrency", self.extraction.concurrency as u64),
            ("extraction.max_content_chars", self.extraction.max_content_chars as u64),
            ("fallback.navigation_timeout_secs", self.fallback.navigation_timeout_secs),
            ("fallback.selector_timeout_secs", self.fallback.selector_timeout_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(PriceScoutError::Config(format!("{name} must be greater than zero")));
        }

        if self.fallback.price_selector.trim().is_empty() {
            return Err(PriceScoutError::Config(
                "fallback.price_selector must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.refine.temperature) {
            return Err(PriceScoutError::Config(
                "refine.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<ScoutConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PriceScoutError::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    let config: ScoutConfig = toml::from_str(&content).map_err(|e| {
        PriceScoutError::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}
