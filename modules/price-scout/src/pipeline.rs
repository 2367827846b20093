use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use price_scout_common::{
    DiscoveryStrategy, ExtractionOutcome, PipelineResponse, PriceScoutError, Query, Result,
    ScoutConfig,
};

use crate::aggregator::aggregate;
use crate::deps::ScoutDeps;
use crate::discovery::{ChainedDiscovery, LlmUrlLister};
use crate::extractor::PrimaryExtractor;
use crate::fallback::FallbackExtractor;
use crate::refiner::QueryRefiner;
use crate::search::SearchProvider;
use crate::traits::{PriceExtractor, UrlDiscovery};

/// Query in, per-URL prices out: refine, discover, extract (primary, then
/// fallback on `NotFound`), aggregate.
///
/// Only bad input and an empty candidate set fail the run. Every per-URL
/// failure ends up as an error record in the response.
pub struct PriceDiscoveryPipeline {
    refiner: QueryRefiner,
    discovery: Arc<dyn UrlDiscovery>,
    primary: Arc<dyn PriceExtractor>,
    fallback: Arc<dyn PriceExtractor>,
    concurrency: usize,
}

impl PriceDiscoveryPipeline {
    pub fn new(
        refiner: QueryRefiner,
        discovery: Arc<dyn UrlDiscovery>,
        primary: Arc<dyn PriceExtractor>,
        fallback: Arc<dyn PriceExtractor>,
    ) -> Self {
        Self {
            refiner,
            discovery,
            primary,
            fallback,
            concurrency: 1,
        }
    }

    /// URLs extracted at once. Results keep candidate order regardless.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn from_deps(deps: ScoutDeps, config: &ScoutConfig) -> Self {
        let refiner = QueryRefiner::new(deps.refine_llm.clone(), &config.refine);

        let search: Arc<dyn UrlDiscovery> =
            Arc::new(SearchProvider::new(deps.search, &config.search));
        let discovery: Arc<dyn UrlDiscovery> = match config.search.strategy {
            DiscoveryStrategy::Search => search,
            DiscoveryStrategy::Llm => Arc::new(ChainedDiscovery::new(
                Arc::new(LlmUrlLister::new(deps.refine_llm, config.refine.timeout())),
                search,
            )),
        };

        let primary = Arc::new(PrimaryExtractor::new(
            deps.renderer,
            deps.extraction_llm,
            &config.extraction,
        ));
        let fallback = Arc::new(FallbackExtractor::new(deps.browser, &config.fallback));

        Self::new(refiner, discovery, primary, fallback)
            .with_concurrency(config.extraction.concurrency)
    }

    pub async fn run(&self, raw_query: &str, country: &str) -> Result<PipelineResponse> {
        let query = Query::new(raw_query, country)?;
        info!(query = %query.raw, country = %query.country, "Price discovery started");

        let refined = self.refiner.refine(&query.raw).await;

        let candidates = self.discovery.discover(&refined.text, &query.country).await;
        if candidates.is_empty() {
            warn!(refined = %refined.text, "No candidate URLs");
            return Err(PriceScoutError::NoCandidateUrls {
                query: refined.text,
            });
        }
        info!(
            urls = candidates.len(),
            discovery = self.discovery.name(),
            "Candidate URLs found"
        );

        let outcomes: Vec<(String, ExtractionOutcome)> = stream::iter(candidates)
            .map(|url| async move {
                let outcome = self.extract_url(&url).await;
                (url, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let response = aggregate(&query, &refined, outcomes);
        info!(
            results = response.results.len(),
            priced = response.priced_count(),
            errors = response.error_count(),
            "Price discovery complete"
        );
        Ok(response)
    }

    async fn extract_url(&self, url: &str) -> ExtractionOutcome {
        let outcome = self.primary.extract(url).await;
        info!(url, extractor = self.primary.name(), outcome = outcome.label(), "Extraction attempt");
        if !outcome.is_not_found() {
            return outcome;
        }

        let outcome = self.fallback.extract(url).await;
        info!(url, extractor = self.fallback.name(), outcome = outcome.label(), "Extraction attempt");
        outcome
    }
}
