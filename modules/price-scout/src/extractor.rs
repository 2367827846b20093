use std::sync::Arc;
use std::time::Duration;

use ai_client::{strip_code_blocks, truncate_to_char_boundary, StructuredOutput};
use async_trait::async_trait;
use tracing::{info, warn};

use price_scout_common::{ExtractionConfig, ExtractionOutcome, PriceSchema};

use crate::traits::{LanguageModel, PageRenderer, PriceExtractor};

const EXTRACTION_INSTRUCTION: &str = "\
You read rendered product pages and report the product's price.

Use the entire visible content of the page. If several prices are shown, \
return the price of the base model (the starting price). Only return a price \
that is written out explicitly with its currency, for example \"$999\" or \
\"999,00 €\". Copy it exactly as displayed. If the page shows no such price, \
return an empty string as the price.";

/// Render the page, then ask the language model for the price against a
/// strict schema. Model problems are reported as `NotFound` so the fallback
/// extractor still gets a chance; only a failed render is an `Error`.
pub struct PrimaryExtractor {
    renderer: Arc<dyn PageRenderer>,
    llm: Arc<dyn LanguageModel>,
    schema: serde_json::Value,
    min_word_count: usize,
    max_content_chars: usize,
    render_timeout: Duration,
    model_timeout: Duration,
}

impl PrimaryExtractor {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        llm: Arc<dyn LanguageModel>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            renderer,
            llm,
            schema: PriceSchema::openai_schema(),
            min_word_count: config.min_word_count.max(1),
            max_content_chars: config.max_content_chars,
            render_timeout: config.render_timeout(),
            model_timeout: config.model_timeout(),
        }
    }

    async fn render(&self, url: &str) -> Result<String, String> {
        match tokio::time::timeout(self.render_timeout, self.renderer.render(url)).await {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => {
                warn!(url, renderer = self.renderer.name(), error = %e, "Page render failed");
                Err(format!("Page render failed: {e:#}"))
            }
            Err(_) => {
                warn!(url, renderer = self.renderer.name(), "Page render timed out");
                Err(format!(
                    "Page render timed out after {}s",
                    self.render_timeout.as_secs()
                ))
            }
        }
    }
}

#[async_trait]
impl PriceExtractor for PrimaryExtractor {
    async fn extract(&self, url: &str) -> ExtractionOutcome {
        let content = match self.render(url).await {
            Ok(content) => content,
            Err(message) => return ExtractionOutcome::Error(message),
        };

        let words = content.split_whitespace().count();
        if words < self.min_word_count {
            info!(url, words, "Too little page content for extraction");
            return ExtractionOutcome::NotFound;
        }

        let content = truncate_to_char_boundary(&content, self.max_content_chars);
        let user_prompt = format!("Source URL: {url}\n\n---\n\n{content}");

        let result = tokio::time::timeout(
            self.model_timeout,
            self.llm
                .extract_json(EXTRACTION_INSTRUCTION, &user_prompt, self.schema.clone()),
        )
        .await;

        let json = match result {
            Ok(Ok(json)) => json,
            Ok(Err(e)) => {
                warn!(url, error = %e, "Price extraction call failed");
                return ExtractionOutcome::NotFound;
            }
            Err(_) => {
                warn!(
                    url,
                    timeout_secs = self.model_timeout.as_secs(),
                    "Price extraction call timed out"
                );
                return ExtractionOutcome::NotFound;
            }
        };

        match PriceSchema::validate(strip_code_blocks(&json)) {
            Some(price) => {
                info!(url, price = %price, "Price extracted");
                ExtractionOutcome::Success(price)
            }
            None => {
                info!(url, "No price in model output");
                ExtractionOutcome::NotFound
            }
        }
    }

    fn name(&self) -> &str {
        "primary"
    }
}
