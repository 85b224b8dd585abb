//! Storage layer for graph, progress, credential and ledger tables.
//!
//! The engine talks to persistence only through [`ProgressionStore`]. Any
//! backend works as long as it upholds the same guarantees as the bundled
//! [`MemoryStore`]:
//!
//! - `insert_edge` validates the edge (see [`validate_edge`]) in the same
//!   critical section as the insert, so concurrent authoring cannot close a
//!   cycle.
//! - `insert_badge_if_absent` / `insert_certification_if_absent` are atomic
//!   "insert unless an Active row exists for (learner, definition)".
//! - `update_node_progress` applies its mutation atomically per row.
//! - `append_event` assigns strictly increasing sequence numbers.
//!
//! # Modules
//!
//! - [`memory`] — `RwLock`-guarded in-memory tables.
//! - [`snapshot`] — versioned JSON save/load for `MemoryStore`.
//!
//! [`validate_edge`]: crate::graph::validate_edge

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;

use crate::badge::{BadgeDefinition, BadgeDefinitionId, BadgeId, CredentialStatus, IssuedBadge};
use crate::certification::{
    CertificationDefinition, CertificationDefinitionId, CertificationId, IssuedCertification,
};
use crate::error::Result;
use crate::graph::{CourseId, DependencyEdge, Node, NodeId};
use crate::ledger::LedgerEvent;
use crate::progress::{
    ActivityId, ActivityOutcome, CourseProgressSummary, LearnerId, NodeProgress,
};

/// Persistence contract of the engine.
pub trait ProgressionStore: Send + Sync {
    // ── Graph ────────────────────────────────────────────────────────────────

    /// Insert or replace a node (threshold edits replace).
    fn put_node(&self, node: Node) -> Result<()>;

    fn node(&self, id: &NodeId) -> Result<Option<Node>>;

    /// Nodes of a course ordered by display order.
    fn nodes_in_course(&self, course: &CourseId) -> Result<Vec<Node>>;

    /// Validate and insert an edge atomically.
    fn insert_edge(&self, edge: DependencyEdge) -> Result<()>;

    /// Edges whose `to` is `node`.
    fn edges_into(&self, node: &NodeId) -> Result<Vec<DependencyEdge>>;

    fn edges_in_course(&self, course: &CourseId) -> Result<Vec<DependencyEdge>>;

    // ── Progress ─────────────────────────────────────────────────────────────

    fn node_progress(&self, learner: &LearnerId, node: &NodeId) -> Result<Option<NodeProgress>>;

    /// Atomically mutate (creating if needed) the row for (learner, node).
    fn update_node_progress(
        &self,
        learner: &LearnerId,
        node: &Node,
        apply: &mut dyn FnMut(&mut NodeProgress),
    ) -> Result<NodeProgress>;

    fn progress_for_learner(&self, learner: &LearnerId) -> Result<Vec<NodeProgress>>;

    fn put_summary(&self, summary: CourseProgressSummary) -> Result<()>;

    fn summary(
        &self,
        learner: &LearnerId,
        course: &CourseId,
    ) -> Result<Option<CourseProgressSummary>>;

    // ── Activity outcomes ────────────────────────────────────────────────────

    /// Insert or replace the outcome for (learner, activity).
    fn put_outcome(&self, outcome: ActivityOutcome) -> Result<()>;

    fn outcome(&self, learner: &LearnerId, activity: &ActivityId)
        -> Result<Option<ActivityOutcome>>;

    fn outcomes_for_learner(&self, learner: &LearnerId) -> Result<Vec<ActivityOutcome>>;

    // ── Badges ───────────────────────────────────────────────────────────────

    fn put_badge_definition(&self, definition: BadgeDefinition) -> Result<()>;

    fn badge_definition(&self, id: &BadgeDefinitionId) -> Result<Option<BadgeDefinition>>;

    fn badge_definitions(&self) -> Result<Vec<BadgeDefinition>>;

    /// Insert unless an Active badge exists for (learner, definition).
    /// Returns `false` when nothing was inserted.
    fn insert_badge_if_absent(&self, badge: IssuedBadge) -> Result<bool>;

    fn badge(&self, id: &BadgeId) -> Result<Option<IssuedBadge>>;

    /// The Active badge for (learner, definition), if any.
    fn active_badge(
        &self,
        learner: &LearnerId,
        definition: &BadgeDefinitionId,
    ) -> Result<Option<IssuedBadge>>;

    /// All badges of a learner, oldest first.
    fn badges_for_learner(&self, learner: &LearnerId) -> Result<Vec<IssuedBadge>>;

    /// Every Active badge.
    fn active_badges(&self) -> Result<Vec<IssuedBadge>>;

    /// Move an Active badge to `status`. Returns `None` when the badge was
    /// not Active (nothing changed).
    fn transition_badge(
        &self,
        id: &BadgeId,
        status: CredentialStatus,
        reason: Option<String>,
        at: u64,
    ) -> Result<Option<IssuedBadge>>;

    // ── Certifications ───────────────────────────────────────────────────────

    fn put_certification_definition(&self, definition: CertificationDefinition) -> Result<()>;

    fn certification_definition(
        &self,
        id: &CertificationDefinitionId,
    ) -> Result<Option<CertificationDefinition>>;

    fn certification_definitions(&self) -> Result<Vec<CertificationDefinition>>;

    /// Insert unless an Active certification exists for (learner, definition).
    fn insert_certification_if_absent(&self, certification: IssuedCertification) -> Result<bool>;

    fn certification(&self, id: &CertificationId) -> Result<Option<IssuedCertification>>;

    fn certification_by_code(&self, code: &str) -> Result<Option<IssuedCertification>>;

    fn active_certification(
        &self,
        learner: &LearnerId,
        definition: &CertificationDefinitionId,
    ) -> Result<Option<IssuedCertification>>;

    /// All certifications of a learner, oldest first.
    fn certifications_for_learner(&self, learner: &LearnerId) -> Result<Vec<IssuedCertification>>;

    fn active_certifications(&self) -> Result<Vec<IssuedCertification>>;

    fn transition_certification(
        &self,
        id: &CertificationId,
        status: CredentialStatus,
        reason: Option<String>,
        at: u64,
    ) -> Result<Option<IssuedCertification>>;

    // ── Ledger ───────────────────────────────────────────────────────────────

    /// Append an event, assigning its sequence number.
    fn append_event(&self, event: LedgerEvent) -> Result<LedgerEvent>;

    fn events_for(&self, learner: &LearnerId) -> Result<Vec<LedgerEvent>>;

    fn events(&self) -> Result<Vec<LedgerEvent>>;
}
