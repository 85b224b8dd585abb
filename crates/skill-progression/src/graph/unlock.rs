//! Unlock resolver — decides whether a learner may open a node.
//!
//! Incoming edges of the target are partitioned by combinator. The ALL
//! group is satisfied when every predecessor is Completed, the ANY group
//! when at least one is. A node is accessible when every group present is
//! satisfied; a node without incoming edges is always accessible.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressStatus;

use super::types::*;

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub accessible: bool,
    pub reason: String,
    /// Unsatisfied predecessors, sorted, for UI and error messaging.
    pub missing_requirements: Vec<NodeId>,
}

impl AccessDecision {
    fn granted(reason: impl Into<String>) -> Self {
        Self {
            accessible: true,
            reason: reason.into(),
            missing_requirements: Vec::new(),
        }
    }
}

/// Decide accessibility of `target` from its incoming edges.
///
/// `status_of` reports the learner's status on a predecessor; nodes the
/// learner never touched report `NotStarted`. Edges whose `to` is not
/// `target` are ignored.
pub fn can_access<F>(target: &NodeId, incoming: &[DependencyEdge], status_of: F) -> AccessDecision
where
    F: Fn(&NodeId) -> ProgressStatus,
{
    let mut all_group: Vec<&NodeId> = Vec::new();
    let mut any_group: Vec<&NodeId> = Vec::new();
    for edge in incoming.iter().filter(|e| &e.to == target) {
        match edge.combinator {
            Combinator::All => all_group.push(&edge.from),
            Combinator::Any => any_group.push(&edge.from),
        }
    }

    if all_group.is_empty() && any_group.is_empty() {
        return AccessDecision::granted("no prerequisites");
    }

    let is_done = |id: &NodeId| status_of(id) == ProgressStatus::Completed;
    let mut missing: Vec<NodeId> = Vec::new();
    let mut failed_groups: Vec<&'static str> = Vec::new();

    let all_missing: Vec<NodeId> = all_group
        .iter()
        .filter(|id| !is_done(**id))
        .map(|id| (*id).clone())
        .collect();
    if !all_missing.is_empty() {
        failed_groups.push("all of");
        missing.extend(all_missing);
    }

    if !any_group.is_empty() && !any_group.iter().any(|id| is_done(*id)) {
        failed_groups.push("one of");
        missing.extend(any_group.iter().map(|id| (*id).clone()));
    }

    if missing.is_empty() {
        return AccessDecision::granted("all prerequisites completed");
    }

    missing.sort();
    missing.dedup();
    let listed: Vec<&str> = missing.iter().map(NodeId::as_str).collect();
    AccessDecision {
        accessible: false,
        reason: format!(
            "requires completing {} [{}]",
            failed_groups.join(" and "),
            listed.join(", ")
        ),
        missing_requirements: missing,
    }
}
