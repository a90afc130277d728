//! REST and engine transport errors

use thiserror::Error;

/// Transport-level errors from the REST client and the engine session
#[derive(Error, Debug)]
pub enum TransportError {
    /// TLS identity or root certificate could not be loaded
    #[error("Cannot build TLS identity: {0}")]
    Tls(String),

    /// The HTTP client could not be constructed
    #[error("Cannot build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Connection-level failure that survived all retries
    #[error("Connection to {url} failed after {attempts} attempts: {source}")]
    Connect {
        /// Request URL
        url: String,
        /// Attempts made, including the first
        attempts: u32,
        /// Underlying reqwest error
        source: reqwest::Error,
    },

    /// A retriable status was still present after the retry budget ran out
    #[error("{url} still returned {status} after {attempts} attempts")]
    RetriesExhausted {
        /// Request URL
        url: String,
        /// Last status observed
        status: u16,
        /// Attempts made, including the first
        attempts: u32,
    },

    /// The operation was canceled cooperatively
    #[error("Operation canceled")]
    Canceled,

    /// The engine peer replied with a JSON-RPC error object
    #[error("Engine call '{method}' failed: {message}")]
    EngineCall {
        /// JSON-RPC method name
        method: String,
        /// Error message from the peer
        message: String,
    },

    /// The engine peer replied with something that is not JSON-RPC
    #[error("Engine reply is not a JSON-RPC response: {0}")]
    EngineProtocol(String),
}
