//! `MockExecutor` — a test double for `NodeExecutor`.
//!
//! Useful in unit and integration tests that care about *which* nodes were
//! executed and with what input, rather than about simulated effects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{ExecutionContext, NodeError, NodeExecutor, NodeKind, NodeOutcome};

/// Behaviour injected for a specific node id.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Succeed with `value`, firing `handle`.
    Fire { handle: String, value: Value },
    /// Fail as a normal branch outcome on the node's error handle.
    Fail(String),
    /// Return a `NodeError::Unexpected`.
    Panic(String),
}

/// A mock executor that records every call it receives.
///
/// Nodes without a configured behaviour succeed with `{"node": <id>}`
/// and fire their type's default handle.
#[derive(Default)]
pub struct MockExecutor {
    behaviours: HashMap<String, MockBehaviour>,
    /// `(node_id, input)` for every call, in call order.
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node_id` fire `handle` with `value`.
    pub fn firing(mut self, node_id: impl Into<String>, handle: impl Into<String>, value: Value) -> Self {
        self.behaviours.insert(
            node_id.into(),
            MockBehaviour::Fire {
                handle: handle.into(),
                value,
            },
        );
        self
    }

    /// Make `node_id` fail on its error handle.
    pub fn failing(mut self, node_id: impl Into<String>, msg: impl Into<String>) -> Self {
        self.behaviours
            .insert(node_id.into(), MockBehaviour::Fail(msg.into()));
        self
    }

    /// Make `node_id` return an unexpected executor error.
    pub fn erroring(mut self, node_id: impl Into<String>, msg: impl Into<String>) -> Self {
        self.behaviours
            .insert(node_id.into(), MockBehaviour::Panic(msg.into()));
        self
    }

    /// Node ids in the order they were executed.
    pub fn executed(&self) -> Vec<String> {
        self.lock_calls().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Input the given node received on its most recent call.
    pub fn input_of(&self, node_id: &str) -> Option<Value> {
        self.lock_calls()
            .iter()
            .rev()
            .find(|(id, _)| id == node_id)
            .map(|(_, input)| input.clone())
    }

    /// Number of times any node has been executed.
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(String, Value)>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(
        &self,
        kind: &NodeKind,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<NodeOutcome, NodeError> {
        self.lock_calls().push((ctx.node_id.clone(), input));
        let node_type = kind.node_type();

        match self.behaviours.get(&ctx.node_id) {
            None => Ok(NodeOutcome::fired(
                json!({ "node": ctx.node_id }),
                node_type.default_handle(),
            )),
            Some(MockBehaviour::Fire { handle, value }) => Ok(NodeOutcome::fired(value.clone(), handle)),
            Some(MockBehaviour::Fail(msg)) => Ok(NodeOutcome::failed(
                Some(json!({ "node": ctx.node_id, "error": msg })),
                msg.clone(),
                node_type.error_handle(),
            )),
            Some(MockBehaviour::Panic(msg)) => Err(NodeError::Unexpected(msg.clone())),
        }
    }
}
