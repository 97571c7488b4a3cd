//! Connection validation, run before an edge is committed to a graph.
//!
//! Rules enforced, in order:
//! 1. Both endpoints are named and distinct.
//! 2. Both endpoint nodes exist.
//! 3. The target accepts input (triggers don't) and the source has outputs.
//! 4. The exact connection doesn't already exist.
//! 5. The target's input slot is free (one edge per `(target, targetHandle)`).
//! 6. An explicit source handle is one the source type actually has.
//! 7. The edge doesn't close a cycle.

use thiserror::Error;

use nodes::NodeType;

use crate::cycle::would_create_cycle;
use crate::models::{Edge, Graph};

/// Why a proposed edge was refused.  `Display` is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionRejected {
    #[error("Source and target are required")]
    MissingEndpoint,

    #[error("Cannot connect a node to itself")]
    SelfConnection,

    #[error("Node '{0}' does not exist")]
    UnknownNode(String),

    #[error("{0} nodes cannot receive inputs")]
    TargetHasNoInputs(NodeType),

    #[error("{0} nodes have no outputs")]
    SourceHasNoOutputs(NodeType),

    #[error("This connection already exists")]
    Duplicate,

    #[error("Input of '{0}' is already connected")]
    InputOccupied(String),

    #[error("'{handle}' is not an output of {node_type} nodes")]
    InvalidSourceHandle { handle: String, node_type: NodeType },

    #[error("This connection would create a cycle")]
    WouldCreateCycle,
}

/// Decide whether `edge` may be added to `graph`.  Pure; `graph` is not touched.
pub fn validate_connection(edge: &Edge, graph: &Graph) -> Result<(), ConnectionRejected> {
    if edge.source.trim().is_empty() || edge.target.trim().is_empty() {
        return Err(ConnectionRejected::MissingEndpoint);
    }
    if edge.source == edge.target {
        return Err(ConnectionRejected::SelfConnection);
    }

    let source = graph
        .node(&edge.source)
        .ok_or_else(|| ConnectionRejected::UnknownNode(edge.source.clone()))?;
    let target = graph
        .node(&edge.target)
        .ok_or_else(|| ConnectionRejected::UnknownNode(edge.target.clone()))?;

    let (source_type, target_type) = (source.node_type(), target.node_type());
    if target_type.input_ports() == 0 {
        return Err(ConnectionRejected::TargetHasNoInputs(target_type));
    }
    if source_type.output_handles().is_empty() {
        return Err(ConnectionRejected::SourceHasNoOutputs(source_type));
    }

    if graph.edges.iter().any(|e| e.same_connection(edge)) {
        return Err(ConnectionRejected::Duplicate);
    }
    if graph
        .edges
        .iter()
        .any(|e| e.target == edge.target && e.target_handle == edge.target_handle)
    {
        return Err(ConnectionRejected::InputOccupied(edge.target.clone()));
    }

    if let Some(handle) = edge.source_handle.as_deref() {
        if !source_type.has_handle(handle) {
            return Err(ConnectionRejected::InvalidSourceHandle {
                handle: handle.to_owned(),
                node_type: source_type,
            });
        }
    }

    if would_create_cycle(edge, &graph.edges) {
        return Err(ConnectionRejected::WouldCreateCycle);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Node;
    use nodes::kind::{ConditionConfig, HttpRequestConfig, TransformConfig};
    use nodes::NodeKind;

    fn graph() -> Graph {
        let mut g = Graph::new();
        g.add_node(Node::new("trigger", "Start", NodeKind::manual_trigger())).unwrap();
        g.add_node(Node::new("http", "Call API", NodeKind::HttpRequest(HttpRequestConfig::default())))
            .unwrap();
        g.add_node(Node::new("cond", "Check", NodeKind::Condition(ConditionConfig::default())))
            .unwrap();
        g.add_node(Node::new("xf", "Shape", NodeKind::Transform(TransformConfig::default())))
            .unwrap();
        g
    }

    #[test]
    fn accepts_a_legal_edge() {
        let mut g = graph();
        assert_eq!(g.connect(Edge::new("trigger", "http")), Ok(()));
        assert_eq!(g.connect(Edge::new("http", "cond").from_handle("success")), Ok(()));
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn rejects_missing_and_self_endpoints() {
        let g = graph();
        assert_eq!(
            validate_connection(&Edge::new("", "http"), &g),
            Err(ConnectionRejected::MissingEndpoint)
        );
        assert_eq!(
            validate_connection(&Edge::new("http", "http"), &g),
            Err(ConnectionRejected::SelfConnection)
        );
        assert_eq!(
            validate_connection(&Edge::new("http", "ghost"), &g),
            Err(ConnectionRejected::UnknownNode("ghost".into()))
        );
    }

    #[test]
    fn triggers_cannot_receive_inputs() {
        let err = validate_connection(&Edge::new("http", "trigger"), &graph()).unwrap_err();
        assert_eq!(err, ConnectionRejected::TargetHasNoInputs(NodeType::ManualTrigger));
        assert_eq!(err.to_string(), "manual-trigger nodes cannot receive inputs");
    }

    #[test]
    fn duplicate_and_occupied_slots_are_rejected() {
        let mut g = graph();
        g.connect(Edge::new("trigger", "http")).unwrap();

        assert_eq!(
            g.connect(Edge::new("trigger", "http").with_id("other")),
            Err(ConnectionRejected::Duplicate)
        );
        assert_eq!(
            g.connect(Edge::new("cond", "http")),
            Err(ConnectionRejected::InputOccupied("http".into()))
        );
        // A different target handle is a different slot.
        assert_eq!(g.connect(Edge::new("cond", "http").to_handle("aux")), Ok(()));
    }

    #[test]
    fn source_handle_must_exist_on_source_type() {
        let g = graph();
        assert!(matches!(
            validate_connection(&Edge::new("cond", "xf").from_handle("success"), &g),
            Err(ConnectionRejected::InvalidSourceHandle { handle, .. }) if handle == "success"
        ));
        assert_eq!(validate_connection(&Edge::new("cond", "xf").from_handle("false"), &g), Ok(()));
    }

    #[test]
    fn cycles_are_refused_before_commit() {
        let mut g = graph();
        g.connect(Edge::new("http", "cond").from_handle("success")).unwrap();
        g.connect(Edge::new("cond", "xf").from_handle("true")).unwrap();

        assert_eq!(
            g.connect(Edge::new("xf", "http")),
            Err(ConnectionRejected::WouldCreateCycle)
        );
        assert_eq!(g.edges.len(), 2);
    }
}
