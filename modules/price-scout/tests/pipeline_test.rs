//! End-to-end pipeline behaviour on mocked collaborators.

use std::sync::Arc;
use std::time::Duration;

use price_scout::refiner::QueryRefiner;
use price_scout::search::SearchProvider;
use price_scout::testing::{
    search_response, MockDiscovery, MockExtractor, MockLanguageModel, MockSearchBackend,
};
use price_scout::traits::UrlDiscovery;
use price_scout::PriceDiscoveryPipeline;
use price_scout_common::{
    ExtractionOutcome, PriceScoutError, RefineConfig, ResultRecord, SearchConfig, PRICE_NOT_FOUND,
};

const RAW_QUERY: &str = "iPhone 16 Pro, 128GB";
const A: &str = "https://www.apple.com/shop/buy-iphone/iphone-16-pro";
const B: &str = "https://www.bestbuy.com/site/iphone-16-pro";
const C: &str = "https://www.target.com/p/iphone-16-pro";

struct Harness {
    llm: Arc<MockLanguageModel>,
    discovery: Arc<dyn UrlDiscovery>,
    primary: Arc<MockExtractor>,
    fallback: Arc<MockExtractor>,
}

impl Harness {
    fn new(discovery: Arc<dyn UrlDiscovery>) -> Self {
        Self {
            llm: Arc::new(MockLanguageModel::new().completing("iPhone 16 Pro 128GB")),
            discovery,
            primary: Arc::new(MockExtractor::new("primary")),
            fallback: Arc::new(MockExtractor::new("fallback")),
        }
    }

    fn with_urls(urls: &[&str]) -> Self {
        Self::new(Arc::new(MockDiscovery::new(urls)))
    }

    fn llm(mut self, llm: MockLanguageModel) -> Self {
        self.llm = Arc::new(llm);
        self
    }

    fn primary(mut self, primary: MockExtractor) -> Self {
        self.primary = Arc::new(primary);
        self
    }

    fn fallback(mut self, fallback: MockExtractor) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    fn pipeline(&self) -> PriceDiscoveryPipeline {
        PriceDiscoveryPipeline::new(
            QueryRefiner::new(self.llm.clone(), &RefineConfig::default()),
            self.discovery.clone(),
            self.primary.clone(),
            self.fallback.clone(),
        )
    }
}

#[tokio::test]
async fn one_record_per_candidate_url_in_discovery_order() {
    let harness = Harness::with_urls(&[A, B, C]).primary(
        MockExtractor::new("primary").by_default(ExtractionOutcome::Success("$999.00".into())),
    );

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    let urls: Vec<&str> = response.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec![A, B, C]);
    assert_eq!(response.query, RAW_QUERY);
    assert_eq!(response.country, "US");
    assert_eq!(response.refined_query, "iPhone 16 Pro 128GB buy online");
}

#[tokio::test]
async fn missing_query_fails_before_any_collaborator_runs() {
    let discovery = Arc::new(MockDiscovery::new(&[A]));
    let harness = Harness::new(discovery.clone());

    let err = harness.pipeline().run("   ", "US").await.unwrap_err();

    assert!(matches!(err, PriceScoutError::MissingField("query")));
    assert!(err.is_input_error());
    assert_eq!(harness.llm.complete_calls(), 0);
    assert_eq!(discovery.calls(), 0);
    assert!(harness.primary.calls().is_empty());
    assert!(harness.fallback.calls().is_empty());
}

#[tokio::test]
async fn missing_country_fails_before_any_collaborator_runs() {
    let discovery = Arc::new(MockDiscovery::new(&[A]));
    let harness = Harness::new(discovery.clone());

    let err = harness.pipeline().run(RAW_QUERY, "").await.unwrap_err();

    assert!(matches!(err, PriceScoutError::MissingField("country")));
    assert_eq!(harness.llm.complete_calls(), 0);
    assert_eq!(discovery.calls(), 0);
}

#[tokio::test]
async fn no_candidates_is_a_discovery_error_and_nothing_is_extracted() {
    let harness = Harness::with_urls(&[]);

    let err = harness.pipeline().run(RAW_QUERY, "US").await.unwrap_err();

    match err {
        PriceScoutError::NoCandidateUrls { query } => {
            assert_eq!(query, "iPhone 16 Pro 128GB buy online")
        }
        other => panic!("expected discovery error, got {other:?}"),
    }
    assert!(harness.primary.calls().is_empty());
    assert!(harness.fallback.calls().is_empty());
}

#[tokio::test]
async fn primary_success_is_recorded_without_error_key() {
    let harness = Harness::with_urls(&[A]).primary(
        MockExtractor::new("primary").on_url(A, ExtractionOutcome::Success("$499".into())),
    );

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    assert_eq!(response.results, vec![ResultRecord::priced(A, "$499")]);
    let json = serde_json::to_value(&response.results[0]).unwrap();
    assert_eq!(json, serde_json::json!({ "url": A, "price": "$499" }));
    assert!(harness.fallback.calls().is_empty());
}

#[tokio::test]
async fn fallback_runs_only_when_primary_finds_nothing() {
    let harness = Harness::with_urls(&[A, B, C])
        .primary(
            MockExtractor::new("primary")
                .on_url(A, ExtractionOutcome::Success("$999.00".into()))
                .on_url(B, ExtractionOutcome::NotFound)
                .on_url(C, ExtractionOutcome::Error("Page render failed: 403".into())),
        )
        .fallback(
            MockExtractor::new("fallback").on_url(B, ExtractionOutcome::Success("$1099.00".into())),
        );

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    assert_eq!(harness.fallback.calls(), vec![B.to_string()]);
    assert_eq!(
        response.results,
        vec![
            ResultRecord::priced(A, "$999.00"),
            ResultRecord::priced(B, "$1099.00"),
            ResultRecord::failed(C, "Page render failed: 403"),
        ]
    );
}

#[tokio::test]
async fn both_extractors_failing_still_returns_every_record() {
    let harness = Harness::with_urls(&[A, B])
        .primary(
            MockExtractor::new("primary").on_url(B, ExtractionOutcome::Success("$999.00".into())),
        )
        .fallback(MockExtractor::new("fallback").by_default(ExtractionOutcome::Error(
            "Price not found or error occurred: Timeout 10000ms exceeded".into(),
        )));

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    assert_eq!(response.results.len(), 2);
    assert!(response.results[0].is_error());
    assert!(response.results[0].price.is_none());
    assert_eq!(response.results[1], ResultRecord::priced(B, "$999.00"));
    assert_eq!(response.error_count(), 1);
}

#[tokio::test]
async fn fallback_not_found_is_recorded_as_price_not_found() {
    let harness = Harness::with_urls(&[A]);

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    assert_eq!(response.results, vec![ResultRecord::priced(A, PRICE_NOT_FOUND)]);
    assert_eq!(response.priced_count(), 0);
}

#[tokio::test]
async fn refinement_failure_searches_with_raw_query() {
    let discovery = Arc::new(MockDiscovery::new(&[A]));
    let harness = Harness::new(discovery.clone())
        .llm(MockLanguageModel::new().failing("model unavailable"))
        .primary(
            MockExtractor::new("primary").by_default(ExtractionOutcome::Success("$999.00".into())),
        );

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    assert_eq!(response.refined_query, RAW_QUERY);
    assert!(!response.refined_query.contains("buy online"));
    assert_eq!(
        discovery.queries(),
        vec![(RAW_QUERY.to_string(), "US".to_string())]
    );
    assert_eq!(response.results.len(), 1);
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let harness = Harness::with_urls(&[A, B, C])
        .primary(
            MockExtractor::new("primary")
                .on_url(A, ExtractionOutcome::Success("$999.00".into()))
                .on_url(C, ExtractionOutcome::Error("boom".into())),
        )
        .fallback(
            MockExtractor::new("fallback").on_url(B, ExtractionOutcome::Success("$1,099.00".into())),
        );
    let pipeline = harness.pipeline();

    let first = serde_json::to_vec(&pipeline.run(RAW_QUERY, "US").await.unwrap()).unwrap();
    let second = serde_json::to_vec(&pipeline.run(RAW_QUERY, "US").await.unwrap()).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn duplicate_search_links_collapse_to_one_record() {
    let backend = Arc::new(MockSearchBackend::new().then_respond(search_response(
        &[A, B],
        &[B, A, C],
    )));
    let search = SearchProvider::new(backend.clone(), &SearchConfig::default())
        .with_retry_base(Duration::ZERO);
    let harness = Harness::new(Arc::new(search));

    let response = harness.pipeline().run(RAW_QUERY, "US").await.unwrap();

    let urls: Vec<&str> = response.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec![A, B, C]);
    assert_eq!(harness.primary.calls().len(), 3);
    assert_eq!(backend.calls()[0].query, "iPhone 16 Pro 128GB buy online");
    assert_eq!(backend.calls()[0].country, "us");
}

#[tokio::test]
async fn concurrent_extraction_keeps_discovery_order() {
    let harness = Harness::with_urls(&[A, B, C]).primary(
        MockExtractor::new("primary")
            .on_url(A, ExtractionOutcome::Success("$1".into()))
            .on_url(B, ExtractionOutcome::Success("$2".into()))
            .on_url(C, ExtractionOutcome::Success("$3".into()))
            .slow_on(A, Duration::from_millis(300))
            .slow_on(B, Duration::from_millis(150)),
    );

    let response = harness
        .pipeline()
        .with_concurrency(3)
        .run(RAW_QUERY, "US")
        .await
        .unwrap();

    assert_eq!(harness.primary.completed(), vec![C, B, A]);

    let urls: Vec<&str> = response.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec![A, B, C]);
    let prices: Vec<&str> = response
        .results
        .iter()
        .filter_map(|r| r.price.as_deref())
        .collect();
    assert_eq!(prices, vec!["$1", "$2", "$3"]);
}
