//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the engine (graph validation, run control, config).
///
/// Node failures during a run are never surfaced here: they are recorded
/// in the run state and the run carries on.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the graph.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// Topological sort could not place every node.
    #[error("graph contains a cycle through {0:?}")]
    CycleDetected(Vec<String>),

    // ------ Run control errors ------

    /// `start()` or `step()` was called while a run loop is active.
    #[error("a run is already in progress")]
    AlreadyRunning,

    // ------ Configuration errors ------

    #[error("cannot read config file '{path}': {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
