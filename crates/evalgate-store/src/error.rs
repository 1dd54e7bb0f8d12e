//! Error types for evalgate-store

use thiserror::Error;

/// Errors raised by the remote collaborators (dataset store, run-results
/// store, prompt registry).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Dataset does not exist
    #[error("dataset not found: {name}")]
    DatasetNotFound { name: String },

    /// Credentials were not supplied for the REST client
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// Service could not be reached (connect error, 5xx, injected fault)
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Request exceeded its deadline
    #[error("request timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Non-success HTTP status that is not otherwise classified
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Request could not be built (bad host URL etc.)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Whether this error means the remote side could not be consulted at
    /// all, as opposed to answering with a definite negative.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_)
                | StoreError::Timeout { .. }
                | StoreError::MissingCredentials(_)
        )
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout { millis: 0 }
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_classification() {
        assert!(StoreError::Unavailable("down".to_string()).is_unreachable());
        assert!(StoreError::Timeout { millis: 5 }.is_unreachable());
        assert!(!StoreError::DatasetNotFound {
            name: "qa".to_string()
        }
        .is_unreachable());
        assert!(!StoreError::Http {
            status: 400,
            body: String::new()
        }
        .is_unreachable());
    }

    #[test]
    fn test_display_contains_context() {
        let err = StoreError::Http {
            status: 403,
            body: "forbidden".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("forbidden"));
    }
}
