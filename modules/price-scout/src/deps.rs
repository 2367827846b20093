use std::sync::Arc;

use ai_client::OpenAi;
use anyhow::{Context, Result};
use browserless_client::BrowserlessClient;
use serpapi_client::SerpApiClient;
use tracing::info;

use price_scout_common::{AppConfig, ScoutConfig};

use crate::browser::ChromiumLauncher;
use crate::renderer::{BrowserlessRenderer, ChromeRenderer};
use crate::traits::{BrowserLauncher, LanguageModel, PageRenderer, SearchBackend};

/// Every external collaborator the pipeline needs, behind its trait.
#[derive(Clone)]
pub struct ScoutDeps {
    pub refine_llm: Arc<dyn LanguageModel>,
    pub extraction_llm: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchBackend>,
    pub renderer: Arc<dyn PageRenderer>,
    pub browser: Arc<dyn BrowserLauncher>,
}

impl ScoutDeps {
    /// Production wiring: OpenAI-compatible models, SerpApi, Browserless when
    /// configured (local Chromium otherwise) and a local Chromium for the
    /// selector fallback.
    pub fn from_config(app: &AppConfig, config: &ScoutConfig) -> Result<Self> {
        let mut ai = OpenAi::new(&app.openai_api_key, &config.models.refine);
        if let Some(base_url) = &app.openai_base_url {
            ai = ai.with_base_url(base_url);
        }
        let refine_llm = ai.clone().with_timeout(config.refine.timeout());
        let extraction_llm = ai
            .with_model(&config.models.extraction)
            .with_timeout(config.extraction.model_timeout());

        let search = SerpApiClient::with_timeout(&app.serpapi_key, config.search.timeout())
            .context("Failed to build search client")?;

        let renderer: Arc<dyn PageRenderer> = match &app.browserless_url {
            Some(base_url) => {
                let client = BrowserlessClient::with_timeout(
                    base_url,
                    app.browserless_token.as_deref(),
                    config.extraction.render_timeout(),
                )
                .context("Failed to build Browserless client")?;
                Arc::new(BrowserlessRenderer::new(client))
            }
            None => Arc::new(ChromeRenderer::new(
                app.chrome_bin.as_deref(),
                config.extraction.render_timeout(),
            )),
        };

        let browser = ChromiumLauncher::new(
            app.chrome_bin.as_deref(),
            config.fallback.navigation_timeout(),
        );

        info!(
            refine_model = %config.models.refine,
            extraction_model = %config.models.extraction,
            renderer = renderer.name(),
            "Dependencies ready"
        );

        Ok(Self {
            refine_llm: Arc::new(refine_llm),
            extraction_llm: Arc::new(extraction_llm),
            search: Arc::new(search),
            renderer,
            browser: Arc::new(browser),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_config(browserless_url: Option<&str>) -> AppConfig {
        AppConfig {
            openai_api_key: "sk-test".into(),
            openai_base_url: None,
            serpapi_key: "serp-test".into(),
            browserless_url: browserless_url.map(String::from),
            browserless_token: None,
            chrome_bin: None,
        }
    }

    #[test]
    fn browserless_is_used_when_configured() {
        let deps = ScoutDeps::from_config(
            &app_config(Some("http://browserless:3000")),
            &ScoutConfig::default(),
        )
        .unwrap();
        assert_eq!(deps.renderer.name(), "browserless");
    }

    #[test]
    fn local_chrome_renders_otherwise() {
        let deps = ScoutDeps::from_config(&app_config(None), &ScoutConfig::default()).unwrap();
        assert_eq!(deps.renderer.name(), "chrome");
    }
}
