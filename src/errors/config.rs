//! Configuration error types
//!
//! Raised while assembling the connection configuration, before any network
//! I/O happens.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No QSEoW host was provided
    #[error("No Sense host specified (use --host or CTRLQ_HOST)")]
    MissingHost,

    /// Neither a client certificate nor an API key was provided
    #[error("No credentials specified: provide a client certificate triple or an API key")]
    MissingCredentials,

    /// Both a client certificate and an API key were provided
    #[error("Client certificate and API key are mutually exclusive")]
    ConflictingCredentials,

    /// A certificate file could not be read
    #[error("Cannot read certificate file {path}: {source}")]
    CertificateUnreadable {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Unsupported import update mode
    #[error("Unsupported update mode '{0}': only 'create' is supported")]
    UnsupportedUpdateMode(String),

    /// A spreadsheet source was selected without naming the sheet
    #[error("File type 'excel' requires --sheet-name")]
    MissingSheetName,

    /// An output file exists and overwriting was declined
    #[error("Output file {0} exists and overwrite was declined")]
    OverwriteDeclined(PathBuf),
}
