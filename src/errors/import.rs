//! Reference resolution and import errors
//!
//! Each variant names the logical entity (task, event, rule, or app counter)
//! it belongs to, so a failed run can be traced back to source rows.

use thiserror::Error;

use super::{ParseError, RepositoryError};

/// Errors raised while resolving references or executing an import
#[derive(Error, Debug)]
pub enum ImportError {
    /// The parser produced diagnostics; the import never started
    #[error("Source validation failed with {} error(s)", .0.len())]
    Validation(Vec<ParseError>),

    /// A tag name does not exist on the server
    #[error("Task counter {task}: tag '{name}' does not exist on server")]
    UnknownTag {
        /// Task grouping key the tag was declared on
        task: u32,
        /// Tag name as written in the source
        name: String,
    },

    /// A custom property name does not exist on the server
    #[error("Task counter {task}: custom property '{name}' does not exist on server")]
    UnknownCustomProperty {
        /// Task grouping key
        task: u32,
        /// Property name
        name: String,
    },

    /// A custom property value is not among the property's declared choices
    #[error("Task counter {task}: '{value}' is not a declared value of custom property '{name}'")]
    UnknownCustomPropertyValue {
        /// Task grouping key
        task: u32,
        /// Property name
        name: String,
        /// Offending value
        value: String,
    },

    /// An app GUID reference does not exist on the server
    #[error("Task counter {task}: app {guid} does not exist on server")]
    UnknownApp {
        /// Task grouping key
        task: u32,
        /// GUID as written in the source
        guid: String,
    },

    /// A `newapp-<n>` reference points at no uploaded app
    #[error("Task counter {task}: no app was uploaded for counter {counter}")]
    UnknownAppCounter {
        /// Task grouping key
        task: u32,
        /// Referenced app counter
        counter: u32,
    },

    /// An app reference is neither a GUID nor `newapp-<n>`
    #[error("Task counter {task}: app reference '{value}' is neither a GUID nor newapp-<n>")]
    BadAppRef {
        /// Task grouping key
        task: u32,
        /// Raw reference
        value: String,
    },

    /// A composite rule references a task that exists neither on the server
    /// nor in the import source
    #[error(
        "Task counter {task}, event counter {event}, rule counter {rule}: \
         '{value}' matches no existing task and no Task id in this import"
    )]
    UnresolvedRuleRef {
        /// Downstream task grouping key
        task: u32,
        /// Event grouping key
        event: u32,
        /// Rule grouping key
        rule: u32,
        /// Raw reference
        value: String,
    },

    /// A QVF file named by an app row is missing or unreadable
    #[error("App counter {app}: QVF file {path} cannot be read: {reason}")]
    QvfMissing {
        /// App grouping key
        app: u32,
        /// Assembled file path
        path: String,
        /// I/O failure description
        reason: String,
    },

    /// The run was canceled; remaining work items were skipped
    #[error("Import canceled; remaining work items were skipped")]
    Canceled,

    /// A repository call failed for this work item
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
