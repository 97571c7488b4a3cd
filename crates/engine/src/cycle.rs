//! Edit-time cycle detection.

use std::collections::{HashMap, HashSet};

use crate::models::Edge;

/// Would adding `proposed` to `existing` close a directed cycle?
///
/// Runs an iterative DFS from the proposed target over the existing edges
/// plus the proposed one; the answer is yes iff the proposed source is
/// reachable.  O(V + E) per call.
pub fn would_create_cycle(proposed: &Edge, existing: &[Edge]) -> bool {
    if proposed.source == proposed.target {
        return true;
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in existing.iter().chain(std::iter::once(proposed)) {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![proposed.target.as_str()];

    while let Some(current) = stack.pop() {
        if current == proposed.source {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            stack.extend(next.iter().copied().filter(|n| !visited.contains(n)));
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> Vec<Edge> {
        ids.windows(2).map(|w| Edge::new(w[0], w[1])).collect()
    }

    #[test]
    fn self_loop_is_always_a_cycle() {
        assert!(would_create_cycle(&Edge::new("a", "a"), &[]));
        assert!(would_create_cycle(&Edge::new("a", "a"), &chain(&["x", "y"])));
    }

    #[test]
    fn back_edge_closes_a_cycle() {
        let edges = chain(&["a", "b", "c", "d"]);
        assert!(would_create_cycle(&Edge::new("d", "a"), &edges));
        assert!(would_create_cycle(&Edge::new("c", "b"), &edges));
    }

    #[test]
    fn forward_and_cross_edges_are_fine() {
        let mut edges = chain(&["a", "b", "c"]);
        edges.push(Edge::new("a", "x"));
        assert!(!would_create_cycle(&Edge::new("a", "c"), &edges));
        assert!(!would_create_cycle(&Edge::new("x", "c"), &edges));
        assert!(!would_create_cycle(&Edge::new("c", "x"), &edges));
    }

    #[test]
    fn large_graph_stays_cheap() {
        // 200 nodes, ~400 edges: a ladder where i -> i+1 and i -> i+2.
        let mut edges = Vec::new();
        for i in 0..200 {
            edges.push(Edge::new(format!("n{i}"), format!("n{}", i + 1)));
            edges.push(Edge::new(format!("n{i}"), format!("n{}", i + 2)));
        }
        assert!(would_create_cycle(&Edge::new("n201", "n0"), &edges));
        assert!(!would_create_cycle(&Edge::new("n0", "n201"), &edges));
    }
}
