//! Task graph traversal errors

use thiserror::Error;
use uuid::Uuid;

/// Task graph errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// The requested task is not a node of the graph
    #[error("Task {0} not found in graph")]
    UnknownTask(Uuid),

    /// Subtree traversal hit the configured depth limit
    #[error("Subtree below {root} exceeds maximum depth {max_depth}")]
    DepthExceeded {
        /// Traversal origin
        root: Uuid,
        /// Configured limit
        max_depth: usize,
    },
}
