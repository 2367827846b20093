use thiserror::Error;

pub type Result<T> = std::result::Result<T, SerpApiError>;

#[derive(Debug, Error)]
pub enum SerpApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Search timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// SerpApi answered 200 but reported a problem in the `error` field.
    #[error("Search error: {0}")]
    Search(String),

    #[error("Client build error: {0}")]
    Build(String),
}

impl SerpApiError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SerpApiError::Network(_) | SerpApiError::Timeout => true,
            SerpApiError::Api { status, .. } => *status == 429 || *status >= 500,
            SerpApiError::Parse(_) | SerpApiError::Search(_) | SerpApiError::Build(_) => false,
        }
    }
}

impl From<reqwest::Error> for SerpApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SerpApiError::Timeout
        } else {
            SerpApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SerpApiError {
    fn from(err: serde_json::Error) -> Self {
        SerpApiError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SerpApiError::Timeout.is_transient());
        assert!(SerpApiError::Api { status: 503, message: String::new() }.is_transient());
        assert!(SerpApiError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!SerpApiError::Api { status: 401, message: String::new() }.is_transient());
        assert!(!SerpApiError::Search("Invalid API key".into()).is_transient());
    }
}
