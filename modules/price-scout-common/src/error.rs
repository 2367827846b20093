use thiserror::Error;

pub type Result<T> = std::result::Result<T, PriceScoutError>;

/// Request-level failures. Only these abort a discovery run; everything that
/// goes wrong while extracting a single URL is folded into its result record.
#[derive(Error, Debug)]
pub enum PriceScoutError {
    /// A required input was missing or blank. Raised before any collaborator is called.
    #[error("Missing required field: '{0}'")]
    MissingField(&'static str),

    /// Search produced nothing to extract.
    #[error("No candidate URLs found for query: {query}")]
    NoCandidateUrls { query: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PriceScoutError {
    /// Whether the caller supplied bad input, as opposed to the run failing.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PriceScoutError::MissingField(_))
    }
}
