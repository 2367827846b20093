use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use price_scout_common::{RefineConfig, RefinedQuery};

use crate::traits::LanguageModel;

/// Reformat a raw product query into a search phrase. Product identity
/// (name, model, capacity, quantity) must survive untouched.
fn refine_prompt(raw: &str) -> String {
    format!(
        "You turn product queries into search phrases for a price comparison engine.\n\
         \n\
         Rewrite the query below as one clean search phrase. Keep the product name, \
         model, version and quantity exactly as given. Do not correct, validate or \
         expand the query, even if the product does not seem to exist.\n\
         \n\
         Example:\n\
         Input: iPhone 16 Pro, 128GB\n\
         Output: iPhone 16 Pro 128GB\n\
         \n\
         Reply with the search phrase only.\n\
         \n\
         Input: {raw}\n\
         Output:"
    )
}

/// Take the first non-empty line of a completion, minus any echoed
/// `Output:` label and wrapping quotes.
fn clean_completion(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let line = line.strip_prefix("Output:").unwrap_or(line).trim();
    line.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

pub struct QueryRefiner {
    llm: Arc<dyn LanguageModel>,
    temperature: f32,
    suffix: String,
    timeout: Duration,
}

impl QueryRefiner {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &RefineConfig) -> Self {
        Self {
            llm,
            temperature: config.temperature,
            suffix: config.suffix.trim().to_string(),
            timeout: config.timeout(),
        }
    }

    /// Never fails: any model problem yields the raw query unchanged.
    pub async fn refine(&self, raw: &str) -> RefinedQuery {
        let prompt = refine_prompt(raw);
        let result =
            tokio::time::timeout(self.timeout, self.llm.complete(&prompt, self.temperature)).await;

        let phrase = match result {
            Ok(Ok(text)) => clean_completion(&text),
            Ok(Err(e)) => {
                warn!(query = raw, error = %e, "Query refinement failed, using raw query");
                return RefinedQuery::fallback(raw);
            }
            Err(_) => {
                warn!(
                    query = raw,
                    timeout_secs = self.timeout.as_secs(),
                    "Query refinement timed out, using raw query"
                );
                return RefinedQuery::fallback(raw);
            }
        };

        if phrase.is_empty() {
            warn!(query = raw, "Query refinement returned nothing, using raw query");
            return RefinedQuery::fallback(raw);
        }

        let text = if self.suffix.is_empty() {
            phrase
        } else {
            format!("{phrase} {}", self.suffix)
        };
        info!(query = raw, refined = %text, "Query refined");
        RefinedQuery::from_llm(text)
    }
}
