//! Domain-specific error types for ctrlq
//!
//! This module provides structured error types for the different domains of
//! the tool, making error handling consistent, debuggable, and user-friendly.
//!
//! # Error Categories
//!
//! - **ConfigError**: missing/invalid flags, unreadable certificates,
//!   mutually exclusive options. Raised before any network I/O.
//! - **ParseError**: tabular source validation (type coercion, unknown
//!   sheets, missing columns, bad grouping). Carries row and column context.
//! - **TransportError**: connection, TLS, and retry-exhaustion failures from
//!   the REST and engine transports.
//! - **RepositoryError**: QRS-level failures (4xx/5xx responses, undecodable
//!   payloads, missing resources).
//! - **GraphError**: task-graph traversal errors.
//! - **ImportError**: reference resolution and per-item import failures.
//!
//! Every user-visible failure carries the logical entity that triggered it
//! (task counter, event counter, rule counter, app counter, row number) and
//! the HTTP status or validation rule involved.

pub mod config;
pub mod graph;
pub mod import;
pub mod parse;
pub mod repository;
pub mod transport;

// Re-export all error types
pub use config::ConfigError;
pub use graph::GraphError;
pub use import::ImportError;
pub use parse::ParseError;
pub use repository::RepositoryError;
pub use transport::TransportError;

/// Result type alias for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for source parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for Repository (QRS) operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for import operations
pub type ImportResult<T> = Result<T, ImportError>;
