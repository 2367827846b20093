use crate::error::{PriceScoutError, Result};

/// Secrets and environment-specific endpoints, loaded from the process
/// environment (and a `.env` file when present). Tunables live in the TOML
/// `ScoutConfig`.
#[derive(Clone)]
pub struct AppConfig {
    // Language model
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,

    // Search
    pub serpapi_key: String,

    // Page rendering: Browserless when configured, local Chromium otherwise
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub chrome_bin: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_api_key", &preview(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("serpapi_key", &preview(&self.serpapi_key))
            .field("browserless_url", &self.browserless_url)
            .field("browserless_token", &preview_opt(&self.browserless_token))
            .field("chrome_bin", &self.chrome_bin)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            openai_api_key: required_env("OPENAI_API_KEY")?,
            openai_base_url: optional_env("OPENAI_BASE_URL"),
            serpapi_key: required_env("SERPAPI_KEY")?,
            browserless_url: optional_env("BROWSERLESS_URL"),
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
            chrome_bin: optional_env("CHROME_BIN"),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  OPENAI_BASE_URL: {}", self.openai_base_url.as_deref().unwrap_or("<default>"));
        tracing::info!("  SERPAPI_KEY: {}", preview(&self.serpapi_key));
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!("  CHROME_BIN: {}", self.chrome_bin.as_deref().unwrap_or("<not set>"));
    }
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key)
        .ok_or_else(|| PriceScoutError::Config(format!("{key} environment variable is required")))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn preview(val: &str) -> String {
    let n = val.char_indices().nth(5).map_or(val.len(), |(i, _)| i);
    format!("{}...({} chars)", &val[..n], val.len())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) => preview(v),
        None => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_prefix_and_length_only() {
        assert_eq!(preview("sk-abcdefghijkl"), "sk-ab...(15 chars)");
        assert_eq!(preview("abc"), "abc...(3 chars)");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig {
            openai_api_key: "sk-very-secret-key".into(),
            openai_base_url: None,
            serpapi_key: "serp-very-secret".into(),
            browserless_url: Some("http://localhost:3000".into()),
            browserless_token: Some("tok-secret".into()),
            chrome_bin: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret-key"));
        assert!(!debug.contains("serp-very-secret"));
        assert!(!debug.contains("tok-secret"));
        assert!(debug.contains("http://localhost:3000"));
    }
}
