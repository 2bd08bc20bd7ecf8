use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("source unavailable for collection {collection}: {source}")]
    SourceUnavailable {
        collection: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url} (collection {collection})")]
    UnexpectedStatus {
        collection: String,
        status: u16,
        url: String,
    },

    #[error("malformed payload for collection {collection}: {reason}")]
    MalformedPayload { collection: String, reason: String },

    #[error("invalid source base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl ScraperError {
    /// `true` when the upstream could not be reached or answered with a
    /// non-success status. Both are reported as the source being unavailable.
    #[must_use]
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            ScraperError::SourceUnavailable { .. } | ScraperError::UnexpectedStatus { .. }
        )
    }

    /// Collection the error belongs to, when it is tied to one.
    #[must_use]
    pub fn collection(&self) -> Option<&str> {
        match self {
            ScraperError::SourceUnavailable { collection, .. }
            | ScraperError::UnexpectedStatus { collection, .. }
            | ScraperError::MalformedPayload { collection, .. } => Some(collection),
            ScraperError::Client(_) | ScraperError::InvalidBaseUrl { .. } => None,
        }
    }
}
