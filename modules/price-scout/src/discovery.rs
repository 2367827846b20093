use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use price_scout_common::CandidateUrls;

use crate::traits::{LanguageModel, UrlDiscovery};

const LISTING_TEMPERATURE: f32 = 0.3;
const MAX_LISTED_URLS: usize = 5;

fn listing_prompt(query: &str, country: &str, max: usize) -> String {
    format!(
        "List up to {max} product page URLs on official or major retail sites where \
         \"{query}\" can be bought in the country with code {country}. \
         Output only the URLs, one per line, with no other text."
    )
}

/// Pull http(s) URLs out of a line-per-URL completion, ignoring list markers
/// and anything that doesn't parse.
fn parse_listed_urls(text: &str, max: usize) -> CandidateUrls {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')' | ' ')
                })
                .trim_matches(|c| c == '<' || c == '>')
        })
        .filter(|line| line.starts_with("http"))
        .filter(|line| {
            url::Url::parse(line)
                .map(|u| u.scheme() == "http" || u.scheme() == "https")
                .unwrap_or(false)
        })
        .take(max)
        .collect()
}

/// Ask the language model which retailers carry the product. Cheaper than a
/// search call but prone to stale or invented URLs, so it is opt-in.
pub struct LlmUrlLister {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl LlmUrlLister {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

#[async_trait]
impl UrlDiscovery for LlmUrlLister {
    async fn discover(&self, query: &str, country: &str) -> CandidateUrls {
        let prompt = listing_prompt(query, country, MAX_LISTED_URLS);
        match tokio::time::timeout(
            self.timeout,
            self.llm.complete(&prompt, LISTING_TEMPERATURE),
        )
        .await
        {
            Ok(Ok(text)) => {
                let urls = parse_listed_urls(&text, MAX_LISTED_URLS);
                info!(query, country, urls = urls.len(), "Model listed candidate URLs");
                urls
            }
            Ok(Err(e)) => {
                warn!(query, error = %e, "URL listing failed");
                CandidateUrls::new()
            }
            Err(_) => {
                warn!(query, timeout_secs = self.timeout.as_secs(), "URL listing timed out");
                CandidateUrls::new()
            }
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Try `primary`; if it comes back empty, ask `secondary`.
pub struct ChainedDiscovery {
    primary: Arc<dyn UrlDiscovery>,
    secondary: Arc<dyn UrlDiscovery>,
}

impl ChainedDiscovery {
    pub fn new(primary: Arc<dyn UrlDiscovery>, secondary: Arc<dyn UrlDiscovery>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl UrlDiscovery for ChainedDiscovery {
    async fn discover(&self, query: &str, country: &str) -> CandidateUrls {
        let urls = self.primary.discover(query, country).await;
        if !urls.is_empty() {
            return urls;
        }
        info!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            "No candidates from primary discovery, falling back"
        );
        self.secondary.discover(query, country).await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDiscovery, MockLanguageModel};

    #[test]
    fn parses_plain_and_numbered_lines() {
        let text = "Here you go:\n\
                    1. https://www.apple.com/shop/buy-iphone/iphone-16-pro\n\
                    - https://www.bestbuy.com/site/iphone-16-pro\n\
                    * <https://www.amazon.com/dp/B0DHJ>\n\
                    ftp://files.example.com/x\n\
                    https://www.bestbuy.com/site/iphone-16-pro";
        let urls = parse_listed_urls(text, 5);
        assert_eq!(
            urls.into_vec(),
            vec![
                "https://www.apple.com/shop/buy-iphone/iphone-16-pro",
                "https://www.bestbuy.com/site/iphone-16-pro",
                "https://www.amazon.com/dp/B0DHJ",
            ]
        );
    }

    #[test]
    fn stops_at_max() {
        let text = (0..10)
            .map(|i| format!("https://shop{i}.example.com/p"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_listed_urls(&text, 5).len(), 5);
    }

    #[tokio::test]
    async fn lister_returns_model_urls() {
        let llm = MockLanguageModel::new()
            .completing("https://a.example/p\nhttps://b.example/p");
        let lister = LlmUrlLister::new(Arc::new(llm), Duration::from_secs(5));
        let urls = lister.discover("Pixel 9", "us").await;
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn lister_failure_is_empty() {
        let lister = LlmUrlLister::new(
            Arc::new(MockLanguageModel::new().failing("boom")),
            Duration::from_secs(5),
        );
        assert!(lister.discover("Pixel 9", "us").await.is_empty());
    }

    #[tokio::test]
    async fn chain_skips_secondary_when_primary_finds_urls() {
        let primary = Arc::new(MockDiscovery::new(&["https://a.example/p"]));
        let secondary = Arc::new(MockDiscovery::new(&["https://b.example/p"]));
        let chain = ChainedDiscovery::new(primary.clone(), secondary.clone());

        let urls = chain.discover("Pixel 9", "us").await;
        assert_eq!(urls.into_vec(), vec!["https://a.example/p"]);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn chain_falls_back_on_empty_primary() {
        let primary = Arc::new(MockDiscovery::empty());
        let secondary = Arc::new(MockDiscovery::new(&["https://b.example/p"]));
        let chain = ChainedDiscovery::new(primary.clone(), secondary.clone());

        let urls = chain.discover("Pixel 9", "us").await;
        assert_eq!(urls.into_vec(), vec!["https://b.example/p"]);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }
}
