//! Error types for the skill progression engine.
//!
//! Errors cover authoring-time configuration mistakes, malformed activity
//! submissions, and storage failures. Non-eligibility and verification
//! failures are values, not errors, and never appear here.

use crate::graph::NodeId;

/// Engine error types covering all fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Invalid dependency edge: {0}")]
    InvalidEdge(String),

    #[error("Dependency edge {from} -> {to} would create a cycle")]
    CycleDetected { from: NodeId, to: NodeId },

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Node {node} is locked: requires {}", join_ids(.missing))]
    NodeLocked { node: NodeId, missing: Vec<NodeId> },

    #[error("Credential is not active: {0}")]
    NotActive(String),

    #[error("Invalid activity outcome: {0}")]
    InvalidOutcome(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, ProgressionError>;
