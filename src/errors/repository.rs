//! Repository (QRS) error types

use thiserror::Error;

use super::TransportError;

/// Errors surfaced by the typed Repository client
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// QRS answered with a non-success status
    #[error("QRS {path} returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request path
        path: String,
        /// Response body, truncated for display
        body: String,
    },

    /// The response body could not be decoded into the expected type
    #[error("Cannot decode QRS response from {path}: {source}")]
    Decode {
        /// Request path
        path: String,
        /// Underlying serde error
        source: serde_json::Error,
    },

    /// A named resource does not exist on the server
    #[error("{entity} '{name}' not found on server")]
    NotFound {
        /// Resource type (tag, stream, user, app)
        entity: &'static str,
        /// Name or id that was looked up
        name: String,
    },

    /// A QVF file could not be read for upload
    #[error("Cannot read QVF file {path}: {reason}")]
    QvfUnreadable {
        /// File path
        path: String,
        /// I/O failure description
        reason: String,
    },

    /// Transport failure underneath the repository call
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RepositoryError {
    /// Status code of the server response, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            RepositoryError::Http { status, .. } => Some(*status),
            RepositoryError::Transport(TransportError::RetriesExhausted { status, .. }) => {
                Some(*status)
            }
            _ => None,
        }
    }
}
