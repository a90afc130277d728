//! In-memory task model and the task-graph multigraph.
//!
//! `types` holds the normalized task, trigger, and event records;
//! `graph` assembles them into the directed multigraph that the analyzer,
//! exporter, and importer query.

pub mod graph;
pub mod types;

pub use graph::{FilterSpec, TaskEdge, TaskGraph};
pub use types::{
    AppRef, CompositeRule, CompositeTrigger, DaylightSaving, ExecutionState, IncrementOption,
    RuleState, SchemaTrigger, Task, TaskKind, TaskPayload, TimeConstraint, NEVER_TIMESTAMP,
    NO_EXPIRATION_TIMESTAMP,
};
