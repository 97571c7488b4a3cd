//! The `NodeExecutor` trait — the contract the run controller executes through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{NodeError, NodeKind};

/// Per-invocation context handed to an executor.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// executors can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the current run.
    pub run_id: uuid::Uuid,
    /// ID of the node being executed.
    pub node_id: String,
    /// Display name of the node being executed.
    pub node_name: String,
    /// Cancelled when the run is stopped; executors that wait must honour it.
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            run_id: uuid::Uuid::new_v4(),
            node_name: node_id.clone(),
            node_id,
            cancel: CancellationToken::new(),
        }
    }
}

/// What a node produced and which output handles it fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub active_handles: Vec<String>,
}

impl NodeOutcome {
    /// A successful result firing a single handle.
    pub fn fired(output: Value, handle: &str) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            active_handles: vec![handle.to_owned()],
        }
    }

    /// A failed result.  `handle` is the failure branch, if the node has one.
    pub fn failed(output: Option<Value>, error: impl Into<String>, handle: Option<&str>) -> Self {
        Self {
            success: false,
            output,
            error: Some(error.into()),
            active_handles: handle.map(str::to_owned).into_iter().collect(),
        }
    }

    /// The definite result for an id the run snapshot does not contain.
    pub fn not_found() -> Self {
        Self::failed(None, "Node not found", None)
    }

    pub fn fires(&self, handle: &str) -> bool {
        self.active_handles.iter().any(|h| h == handle)
    }
}

/// Executes one node.
///
/// Implementations must not panic on bad configuration: a simulated
/// failure is an `Ok` outcome routed to the `error` handle, and anything
/// truly unexpected is a `NodeError`.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Run `kind` against the data propagated from upstream.
    async fn execute(
        &self,
        kind: &NodeKind,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutcome, NodeError>;
}
