//! Tabular source validation errors
//!
//! Every variant names the offending row (1-based, header included) and
//! column so the user can locate the cell in the source file.

use std::path::PathBuf;

use thiserror::Error;

/// Source file parsing and validation errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Source file could not be read
    #[error("Cannot read source file {path}: {reason}")]
    Source {
        /// Path that failed
        path: PathBuf,
        /// What went wrong opening or reading it
        reason: String,
    },

    /// Named sheet does not exist in the workbook
    #[error("Sheet '{0}' not found in workbook")]
    UnknownSheet(String),

    /// The source has no header row
    #[error("Source file has no header row")]
    EmptyHeader,

    /// A mandatory column is missing from the header
    #[error("Mandatory column '{column}' not found in header")]
    MissingColumn {
        /// Logical column header
        column: String,
    },

    /// A cell failed type coercion
    #[error("Row {row}, column '{column}': cannot interpret '{value}' as {expected}")]
    TypeCoercion {
        /// 1-based source row
        row: usize,
        /// Column header
        column: String,
        /// Offending cell content
        value: String,
        /// Expected logical type
        expected: &'static str,
    },

    /// A mandatory cell is empty
    #[error("Row {row}, column '{column}': value is required")]
    MissingValue {
        /// 1-based source row
        row: usize,
        /// Column header
        column: String,
    },

    /// A column carries a value that is meaningless for the task kind
    #[error("Row {row}, column '{column}' is not valid for task type '{task_type}'")]
    StrayField {
        /// 1-based source row
        row: usize,
        /// Column header
        column: String,
        /// Declared task type of the row group
        task_type: &'static str,
    },

    /// Rows of the same group disagree on a merged value
    #[error("Rows {rows:?}, column '{column}': conflicting values within one group")]
    ConflictingValues {
        /// Rows carrying distinct non-empty values
        rows: Vec<usize>,
        /// Column header
        column: String,
    },

    /// A composite event declared no rules
    #[error("Task counter {task}, event counter {event}: composite event has no rules")]
    CompositeWithoutRules {
        /// Task grouping key
        task: u32,
        /// Event grouping key
        event: u32,
    },

    /// A schedule trigger expires before it starts
    #[error("Row {row}: schema event expiration precedes its start")]
    ExpirationBeforeStart {
        /// 1-based source row
        row: usize,
    },
}
