//! Dependency graph — learning units and the edges that gate them.
//!
//! The graph module provides:
//! - Node and dependency-edge types, scoped per course
//! - Write-time edge validation, including cycle rejection
//! - The unlock resolver deciding whether a learner may open a node

pub mod dag;
pub mod types;
pub mod unlock;

pub use types::{Combinator, ContentKind, CourseId, DependencyEdge, Node, NodeId};

pub use dag::{reaches, validate_edge, validate_node};
pub use unlock::{can_access, AccessDecision};
