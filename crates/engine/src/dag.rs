//! Topological scheduling and whole-graph validation.
//!
//! [`topological_order`] is the run-time scheduler: it never fails, and if a
//! residual cycle slipped past edit-time checks it returns the orderable
//! subset plus the nodes it could not place.  [`validate_graph`] is the
//! strict counterpart used when loading or checking a graph.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::models::{Edge, Graph, Node};
use crate::EngineError;

/// Result of scheduling a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Node ids such that every edge `u -> v` has `u` before `v`.
    pub order: Vec<String>,
    /// Nodes left unplaced because they sit on or behind a cycle.
    pub unscheduled: Vec<String>,
}

impl Schedule {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }
}

/// Kahn's algorithm over `nodes` / `edges`.
///
/// Every node without incoming edges seeds the queue, not only triggers.
/// Ties are broken FIFO in `nodes` order, so identical input gives an
/// identical order.  Edges naming unknown nodes are ignored.
pub fn topological_order(nodes: &[Node], edges: &[Edge]) -> Schedule {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        position.entry(node.id.as_str()).or_insert(i);
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for edge in edges {
        let (Some(&from), Some(&to)) = (
            position.get(edge.source.as_str()),
            position.get(edge.target.as_str()),
        ) else {
            continue;
        };
        successors[from].push(to);
        in_degree[to] += 1;
    }

    // Duplicate ids collapse onto their first definition.
    let mut queue: VecDeque<usize> = (0..nodes.len())
        .filter(|&i| position[nodes[i].id.as_str()] == i && in_degree[i] == 0)
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(nodes.len());
    while let Some(current) = queue.pop_front() {
        order.push(nodes[current].id.clone());
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
    let mut unscheduled: Vec<String> = Vec::new();
    for node in nodes {
        if !placed.contains(node.id.as_str()) && !unscheduled.contains(&node.id) {
            unscheduled.push(node.id.clone());
        }
    }

    if !unscheduled.is_empty() {
        warn!(
            "graph contains a cycle; {} node(s) cannot be scheduled: {:?}",
            unscheduled.len(),
            unscheduled
        );
    }

    Schedule { order, unscheduled }
}

/// Validate the graph strictly and return nodes in execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_graph(graph: &Graph) -> Result<Vec<String>, EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &graph.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    let schedule = topological_order(&graph.nodes, &graph.edges);
    if !schedule.is_complete() {
        return Err(EngineError::CycleDetected(schedule.unscheduled));
    }

    Ok(schedule.order)
}
