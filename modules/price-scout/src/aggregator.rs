use price_scout_common::{ExtractionOutcome, PipelineResponse, Query, RefinedQuery, ResultRecord};

/// Assemble the response: one record per URL, in candidate order, with the
/// caller's query and country echoed back as given.
pub fn aggregate(
    query: &Query,
    refined: &RefinedQuery,
    outcomes: Vec<(String, ExtractionOutcome)>,
) -> PipelineResponse {
    PipelineResponse {
        query: query.raw.clone(),
        refined_query: refined.text.clone(),
        country: query.country.clone(),
        results: outcomes
            .into_iter()
            .map(|(url, outcome)| ResultRecord::from_outcome(url, outcome))
            .collect(),
    }
}
