//! Core graph models for the execution engine.
//!
//! [`Graph`] is the long-lived, editable node/edge set.  A run never reads
//! it directly: it takes a [`GraphSnapshot`] (an owned copy) at start time
//! so edits made while a run is in flight cannot affect it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use nodes::{NodeKind, NodeType};

use crate::validate::{validate_connection, ConnectionRejected};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the automation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier, unique within the graph (referenced by edges).
    pub id: String,
    /// Display name used in run logs.
    #[serde(default)]
    pub name: String,
    /// Node type plus its configuration.
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// `name`, falling back to the id when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed connection from a source node's output handle to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Branch label (`"true"` / `"false"`) drawn on conditional edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    /// Edge with implicit handles; the id is derived from the endpoints.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("e-{source}-{target}"),
            source,
            target,
            source_handle: None,
            target_handle: None,
            condition: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        self.id = format!("{}-{handle}", self.id);
        self.source_handle = Some(handle);
        self
    }

    pub fn to_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }

    pub fn with_condition(mut self, label: impl Into<String>) -> Self {
        self.condition = Some(label.into());
        self
    }

    /// The handle this edge effectively leaves from: the explicit source
    /// handle, else the branch label, else the source type's default.
    pub fn effective_source_handle<'a>(&'a self, source_type: NodeType) -> &'a str {
        self.source_handle
            .as_deref()
            .or(self.condition.as_deref())
            .unwrap_or_else(|| source_type.default_handle())
    }

    /// Same endpoints and handles.
    pub fn same_connection(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The editable node/edge set.
///
/// Mutations that add structure go through the connection validator, so a
/// graph built with [`Graph::connect`] is always acyclic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Handle shared between the editing surface and a run controller.
pub type SharedGraph = Arc<RwLock<Graph>>;

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from raw parts without validation (e.g. a loaded file).
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Mutable access for in-place config edits.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// # Errors
    /// [`EngineError::DuplicateNodeId`] if the id is already taken.
    pub fn add_node(&mut self, node: Node) -> Result<(), EngineError> {
        if self.node(&node.id).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(self.nodes.remove(index))
    }

    /// Validate `edge` against the current graph and commit it if legal.
    pub fn connect(&mut self, edge: Edge) -> Result<(), ConnectionRejected> {
        validate_connection(&edge, self)?;
        self.edges.push(edge);
        Ok(())
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id == edge_id)?;
        Some(self.edges.remove(index))
    }

    /// Owned copy for a run.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone())
    }
}

// ---------------------------------------------------------------------------
// GraphSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of the graph a single run executes against.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            // First definition wins if ids were duplicated outside the store.
            index.entry(node.id.clone()).or_insert(i);
        }
        Self { nodes, edges, index }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_round_trips_through_flattened_json() {
        let node: Node = serde_json::from_value(json!({
            "id": "wait",
            "name": "Wait a bit",
            "type": "delay",
            "config": { "duration": 2, "unit": "minutes" }
        }))
        .expect("valid node");

        assert_eq!(node.node_type(), NodeType::Delay);
        assert_eq!(node.display_name(), "Wait a bit");
    }

    #[test]
    fn effective_handle_prefers_explicit_then_label_then_default() {
        let plain = Edge::new("c", "x");
        assert_eq!(plain.effective_source_handle(NodeType::Condition), "true");
        assert_eq!(plain.effective_source_handle(NodeType::Transform), "output");

        let labelled = Edge::new("c", "x").with_condition("false");
        assert_eq!(labelled.effective_source_handle(NodeType::Condition), "false");

        let explicit = Edge::new("h", "x").from_handle("error").with_condition("true");
        assert_eq!(explicit.effective_source_handle(NodeType::HttpRequest), "error");
    }

    #[test]
    fn removing_a_node_drops_its_edges() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(Node::new(id, id, NodeKind::manual_trigger())).unwrap();
        }
        graph.edges.push(Edge::new("a", "b"));
        graph.edges.push(Edge::new("b", "c"));

        assert!(graph.remove_node("b").is_some());
        assert!(graph.edges.is_empty());
        assert!(matches!(
            graph.add_node(Node::new("a", "again", NodeKind::manual_trigger())),
            Err(EngineError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("a", "A", NodeKind::manual_trigger())).unwrap();
        let snapshot = graph.snapshot();

        graph.node_mut("a").unwrap().name = "renamed".into();
        graph.remove_node("a");

        assert_eq!(snapshot.node("a").map(|n| n.name.as_str()), Some("A"));
    }
}
