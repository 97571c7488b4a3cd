//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node executor's `execute` method.
///
/// Simulated business failures (an HTTP call that "fails", an email that
/// bounces) are *not* errors: they are ordinary outcomes routed to the
/// node's `error` handle.  This type covers the rest:
/// - `Unexpected`: the executor itself broke; the controller records the
///   node as failed and carries on with the next scheduled node.
/// - `Cancelled`: the run was stopped while the node was suspended.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Something went wrong inside the executor.
    #[error("unexpected node error: {0}")]
    Unexpected(String),

    /// The run was stopped while this node was waiting.
    #[error("node execution cancelled")]
    Cancelled,
}
