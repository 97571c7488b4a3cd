//! Data propagation along edges and skip propagation down inactive branches.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Map, Value};

use nodes::kind::HANDLE_INPUT;

use crate::models::GraphSnapshot;

/// Assemble the input of `node_id` from the recorded outputs of its parents.
///
/// Each contributing edge adds its source's output under the edge's source
/// handle (`input` when unnamed); a later edge with the same key wins.  A
/// single contributing parent whose output is an object is spread flat
/// instead.  No contributions gives an empty object.
pub fn collect_input(
    snapshot: &GraphSnapshot,
    node_id: &str,
    outputs: &HashMap<String, Value>,
) -> Value {
    let mut merged = Map::new();
    let mut contributions = 0usize;
    let mut last: Option<&Value> = None;

    for edge in snapshot.incoming(node_id) {
        let Some(output) = outputs.get(&edge.source) else {
            continue;
        };
        let key = edge.source_handle.as_deref().unwrap_or(HANDLE_INPUT);
        merged.insert(key.to_owned(), output.clone());
        contributions += 1;
        last = Some(output);
    }

    match (contributions, last) {
        (1, Some(Value::Object(flat))) => Value::Object(flat.clone()),
        _ => Value::Object(merged),
    }
}

/// Nodes to skip after `node_id` fired `active_handles`.
///
/// Targets of outgoing edges whose effective handle did not fire are
/// seeded (unless an active edge from the same node also reaches them),
/// then everything downstream of a seed is added.  Returned in discovery
/// order without duplicates.
pub fn inactive_branch(
    snapshot: &GraphSnapshot,
    node_id: &str,
    active_handles: &[String],
) -> Vec<String> {
    let Some(source) = snapshot.node(node_id) else {
        return Vec::new();
    };
    let source_type = source.node_type();

    let mut active_targets: HashSet<&str> = HashSet::new();
    let mut seeds: Vec<&str> = Vec::new();
    for edge in snapshot.outgoing(node_id) {
        let handle = edge.effective_source_handle(source_type);
        if active_handles.iter().any(|h| h == handle) {
            active_targets.insert(edge.target.as_str());
        } else {
            seeds.push(edge.target.as_str());
        }
    }

    let mut skipped: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = seeds
        .into_iter()
        .filter(|t| !active_targets.contains(t))
        .collect();

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        skipped.push(current.to_owned());
        for edge in snapshot.outgoing(current) {
            if !seen.contains(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }

    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, Node};
    use nodes::kind::{ConditionConfig, SendEmailConfig, TransformConfig};
    use nodes::NodeKind;
    use serde_json::json;

    fn snapshot(nodes: Vec<Node>, edges: Vec<Edge>) -> GraphSnapshot {
        GraphSnapshot::new(nodes, edges)
    }

    fn transform(id: &str) -> Node {
        Node::new(id, id, NodeKind::Transform(TransformConfig::default()))
    }

    #[test]
    fn single_object_parent_is_spread_flat() {
        let snap = snapshot(vec![transform("a"), transform("b")], vec![Edge::new("a", "b")]);
        let outputs = HashMap::from([("a".to_owned(), json!({ "x": 1 }))]);
        assert_eq!(collect_input(&snap, "b", &outputs), json!({ "x": 1 }));
    }

    #[test]
    fn multiple_parents_are_keyed_by_handle() {
        let snap = snapshot(
            vec![transform("a"), transform("b"), transform("c")],
            vec![
                Edge::new("a", "c").from_handle("left"),
                Edge::new("b", "c").to_handle("second"),
            ],
        );
        let outputs = HashMap::from([
            ("a".to_owned(), json!({ "x": 1 })),
            ("b".to_owned(), json!("raw")),
        ]);
        assert_eq!(
            collect_input(&snap, "c", &outputs),
            json!({ "left": { "x": 1 }, "input": "raw" })
        );
    }

    #[test]
    fn scalar_single_parent_is_nested_and_missing_parents_ignored() {
        let snap = snapshot(
            vec![transform("a"), transform("b"), transform("c")],
            vec![Edge::new("a", "c"), Edge::new("b", "c").to_handle("other")],
        );
        let outputs = HashMap::from([("a".to_owned(), json!(5))]);
        assert_eq!(collect_input(&snap, "c", &outputs), json!({ "input": 5 }));
        assert_eq!(collect_input(&snap, "a", &outputs), json!({}));
    }

    #[test]
    fn inactive_branch_is_skipped_transitively() {
        // cond --true--> email ; cond --false--> sms -> after_sms -> tail
        let nodes = vec![
            Node::new("cond", "cond", NodeKind::Condition(ConditionConfig::default())),
            Node::new("email", "email", NodeKind::SendEmail(SendEmailConfig::default())),
            transform("sms"),
            transform("after_sms"),
            transform("tail"),
        ];
        let edges = vec![
            Edge::new("cond", "email").from_handle("true"),
            Edge::new("cond", "sms").from_handle("false"),
            Edge::new("sms", "after_sms"),
            Edge::new("after_sms", "tail"),
        ];
        let snap = snapshot(nodes, edges);

        let skipped = inactive_branch(&snap, "cond", &["true".to_owned()]);
        assert_eq!(skipped, vec!["sms", "after_sms", "tail"]);

        let skipped = inactive_branch(&snap, "cond", &["false".to_owned()]);
        assert_eq!(skipped, vec!["email"]);
    }

    #[test]
    fn target_reached_by_an_active_edge_is_not_seeded() {
        let nodes = vec![
            Node::new("cond", "cond", NodeKind::Condition(ConditionConfig::default())),
            transform("both"),
        ];
        let edges = vec![
            Edge::new("cond", "both").from_handle("true"),
            Edge::new("cond", "both").from_handle("false").to_handle("alt"),
        ];
        let snap = snapshot(nodes, edges);
        assert!(inactive_branch(&snap, "cond", &["true".to_owned()]).is_empty());
    }

    #[test]
    fn no_fired_handle_skips_every_child() {
        let snap = snapshot(
            vec![transform("a"), transform("b"), transform("c")],
            vec![Edge::new("a", "b"), Edge::new("b", "c")],
        );
        assert_eq!(inactive_branch(&snap, "a", &[]), vec!["b", "c"]);
    }
}
