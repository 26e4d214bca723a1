use std::time::Duration;

use thiserror::Error;

/// Every failure the tracker can surface. None of them stop the polling loops.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Syncthing is unreachable: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    #[error("{endpoint} did not answer within {timeout:?}")]
    TimedOut { endpoint: String, timeout: Duration },

    #[error("{endpoint} rejected the API key ({status})")]
    AuthenticationFailed { endpoint: String, status: u16 },

    #[error("{endpoint} returned {status}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("{endpoint} returned malformed JSON: {source}")]
    MalformedResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not parse timestamp '{0}'")]
    DateParseFailure(String),

    #[error("event {id} is at or below the watermark {watermark}")]
    DuplicateOrStaleEvent { id: u64, watermark: u64 },

    #[error("unknown folder '{0}'")]
    UnknownFolder(String),

    #[error("unknown client '{0}'")]
    UnknownClient(String),

    #[error("invalid Syncthing URL '{0}'")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("file tree build failed: {0}")]
    TreeBuild(String),
}

impl TrackerError {
    /// Whether the next polling cycle should try again on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::NetworkUnavailable(_) | TrackerError::TimedOut { .. } => true,
            TrackerError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
