//! Write-time validation for nodes and dependency edges.
//!
//! The edge set of every course must stay acyclic. That is enforced here,
//! once, when an edge is authored; the unlock resolver never re-checks it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{ProgressionError, Result};

use super::types::*;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Validate a node before it is stored.
pub fn validate_node(node: &Node) -> Result<()> {
    if node.id.0.trim().is_empty() {
        return Err(ProgressionError::InvalidNode("node id is empty".into()));
    }
    if node.course.0.trim().is_empty() {
        return Err(ProgressionError::InvalidNode(format!(
            "node {} has an empty course id",
            node.id
        )));
    }
    if let Some(threshold) = node.completion_threshold {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ProgressionError::InvalidNode(format!(
                "node {} threshold must be within 0-100, got {threshold}",
                node.id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Return `true` if `target` is reachable from `start` along `edges`.
///
/// Breadth-first over the outgoing adjacency; `start` reaches itself.
pub fn reaches(start: &NodeId, target: &NodeId, edges: &[DependencyEdge]) -> bool {
    if start == target {
        return true;
    }

    let mut outgoing: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for edge in edges {
        outgoing.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut seen: HashSet<&NodeId> = HashSet::new();
    let mut queue: VecDeque<&NodeId> = VecDeque::new();
    queue.push_back(start);
    seen.insert(start);

    while let Some(current) = queue.pop_front() {
        for &next in outgoing.get(current).into_iter().flatten() {
            if next == target {
                return true;
            }
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

/// Validate an edge against its endpoints and the course's existing edges.
///
/// Rejects unknown endpoints, self-loops, cross-course edges, duplicates,
/// a predecessor already grouped under the other combinator for the same
/// target, and any edge that would close a cycle.
pub fn validate_edge(
    edge: &DependencyEdge,
    from: Option<&Node>,
    to: Option<&Node>,
    course_edges: &[DependencyEdge],
) -> Result<()> {
    let from = from.ok_or_else(|| {
        ProgressionError::InvalidEdge(format!("unknown predecessor node {}", edge.from))
    })?;
    let to = to.ok_or_else(|| {
        ProgressionError::InvalidEdge(format!("unknown target node {}", edge.to))
    })?;

    if from.id == to.id {
        return Err(ProgressionError::CycleDetected {
            from: edge.from.clone(),
            to: edge.to.clone(),
        });
    }

    if from.course != to.course {
        return Err(ProgressionError::InvalidEdge(format!(
            "{} ({}) and {} ({}) belong to different courses",
            from.id, from.course, to.id, to.course
        )));
    }

    if let Some(existing) = course_edges
        .iter()
        .find(|e| e.from == edge.from && e.to == edge.to)
    {
        return Err(ProgressionError::InvalidEdge(if existing.combinator == edge.combinator {
            format!("edge {} -> {} already exists", edge.from, edge.to)
        } else {
            format!(
                "{} is already a {} predecessor of {}",
                edge.from,
                existing.combinator.as_tag(),
                edge.to
            )
        }));
    }

    // Adding from -> to closes a cycle iff `to` already reaches `from`.
    if reaches(&edge.to, &edge.from, course_edges) {
        return Err(ProgressionError::CycleDetected {
            from: edge.from.clone(),
            to: edge.to.clone(),
        });
    }

    Ok(())
}
