//! Error types for Camlistore client operations.

use crate::address::BlobRef;
use std::fmt;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, CamliError>;

/// A server capability advertised (or not) by the discovery document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Blob storage (`blobRoot`).
    Blob,
    /// Search and indexing (`searchRoot`).
    Search,
    /// JSON signing (`jsonSignRoot`).
    Sign,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Search => write!(f, "search"),
            Self::Sign => write!(f, "signing"),
        }
    }
}

/// Errors that can occur while talking to a Camlistore server.
#[derive(Error, Debug)]
pub enum CamliError {
    /// The requested object does not exist on the server.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server answered with an unexpected status.
    #[error("{operation} failed: server returned {status} {reason}")]
    ServerError {
        /// What was being attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// HTTP reason phrase.
        reason: String,
    },

    /// The server does not provide the capability the operation needs.
    #[error("server does not support the {0} interface")]
    FeatureUnavailable(Capability),

    /// Computed content address disagrees with the asserted one.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Asserted blobref.
        expected: BlobRef,
        /// Blobref computed from the data.
        actual: BlobRef,
    },

    /// The discovery target does not speak the Camlistore protocol.
    #[error("not a Camlistore server: {0}")]
    NotACompatibleServer(String),

    /// Unknown hash algorithm name.
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A blobref that does not have the `<algorithm>-<hex>` shape.
    #[error("invalid blobref: {0}")]
    InvalidBlobRef(String),

    /// Upload batch exceeds what the server accepts in one request.
    #[error("upload batch of {size} bytes exceeds the {limit} byte limit")]
    BatchTooLarge {
        /// Total bytes that would be uploaded.
        size: u64,
        /// Maximum accepted bytes.
        limit: u64,
    },

    /// The server answered 200 but the payload was unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing or joining failed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// TOML deserialization failed.
    #[error("TOML error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// HTTP transport failure.
    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CamliError {
    /// Whether this error means the object is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_server_error() {
        let err = CamliError::ServerError {
            operation: "get blob sha1-abc".to_string(),
            status: 500,
            reason: "Internal Server Error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "get blob sha1-abc failed: server returned 500 Internal Server Error"
        );
    }

    #[test]
    fn test_error_display_hash_mismatch() {
        let err = CamliError::HashMismatch {
            expected: BlobRef::from("sha1-abc"),
            actual: BlobRef::from("sha1-def"),
        };
        assert_eq!(
            err.to_string(),
            "content hash mismatch: expected sha1-abc, got sha1-def"
        );
    }

    #[test]
    fn test_error_display_feature_unavailable() {
        let err = CamliError::FeatureUnavailable(Capability::Search);
        assert_eq!(
            err.to_string(),
            "server does not support the search interface"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(CamliError::NotFound("blob x".to_string()).is_not_found());
        assert!(!CamliError::InvalidResponse("x".to_string()).is_not_found());
    }
}
