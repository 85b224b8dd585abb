//! In-memory implementation of [`ProgressionStore`].
//!
//! All tables live behind one `RwLock`, which makes every trait method a
//! single critical section. The uniqueness of Active credentials is kept
//! by dedicated `(learner, definition) -> id` maps that are checked and
//! written under the same write guard as the record itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::badge::{BadgeDefinition, BadgeDefinitionId, BadgeId, CredentialStatus, IssuedBadge};
use crate::certification::{
    CertificationDefinition, CertificationDefinitionId, CertificationId, IssuedCertification,
};
use crate::error::{ProgressionError, Result};
use crate::graph::{validate_edge, CourseId, DependencyEdge, Node, NodeId};
use crate::ledger::LedgerEvent;
use crate::progress::{
    ActivityId, ActivityOutcome, CourseProgressSummary, LearnerId, NodeProgress,
};

use super::snapshot::Snapshot;
use super::ProgressionStore;

/// Owned tables plus the secondary indexes derived from them.
#[derive(Default)]
pub(crate) struct Tables {
    nodes: HashMap<NodeId, Node>,
    edges: Vec<DependencyEdge>,
    progress: HashMap<(LearnerId, NodeId), NodeProgress>,
    summaries: HashMap<(LearnerId, CourseId), CourseProgressSummary>,
    outcomes: HashMap<(LearnerId, ActivityId), ActivityOutcome>,
    badge_definitions: BTreeMap<BadgeDefinitionId, BadgeDefinition>,
    badges: HashMap<BadgeId, IssuedBadge>,
    active_badges: HashMap<(LearnerId, BadgeDefinitionId), BadgeId>,
    certification_definitions: BTreeMap<CertificationDefinitionId, CertificationDefinition>,
    certifications: HashMap<CertificationId, IssuedCertification>,
    active_certifications: HashMap<(LearnerId, CertificationDefinitionId), CertificationId>,
    certifications_by_code: HashMap<String, CertificationId>,
    events: Vec<LedgerEvent>,
}

impl Tables {
    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut tables = Tables {
            edges: snapshot.edges,
            events: snapshot.events,
            ..Tables::default()
        };
        for node in snapshot.nodes {
            tables.nodes.insert(node.id.clone(), node);
        }
        for row in snapshot.progress {
            tables
                .progress
                .insert((row.learner.clone(), row.node.clone()), row);
        }
        for summary in snapshot.summaries {
            tables
                .summaries
                .insert((summary.learner.clone(), summary.course.clone()), summary);
        }
        for outcome in snapshot.outcomes {
            tables.outcomes.insert(
                (outcome.learner.clone(), outcome.activity_id.clone()),
                outcome,
            );
        }
        for definition in snapshot.badge_definitions {
            tables
                .badge_definitions
                .insert(definition.id.clone(), definition);
        }
        for badge in snapshot.badges {
            if badge.status == CredentialStatus::Active {
                tables.active_badges.insert(
                    (badge.learner.clone(), badge.definition.clone()),
                    badge.id.clone(),
                );
            }
            tables.badges.insert(badge.id.clone(), badge);
        }
        for definition in snapshot.certification_definitions {
            tables
                .certification_definitions
                .insert(definition.id.clone(), definition);
        }
        for cert in snapshot.certifications {
            if cert.status == CredentialStatus::Active {
                tables.active_certifications.insert(
                    (cert.learner.clone(), cert.definition.clone()),
                    cert.id.clone(),
                );
            }
            tables
                .certifications_by_code
                .insert(cert.verification_code.clone(), cert.id.clone());
            tables.certifications.insert(cert.id.clone(), cert);
        }
        tables
    }

    pub(crate) fn to_snapshot(&self) -> Snapshot {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| (&a.course, a.display_order, &a.id).cmp(&(&b.course, b.display_order, &b.id)));

        let mut progress: Vec<NodeProgress> = self.progress.values().cloned().collect();
        progress.sort_by(|a, b| (&a.learner, &a.node).cmp(&(&b.learner, &b.node)));

        let mut summaries: Vec<CourseProgressSummary> = self.summaries.values().cloned().collect();
        summaries.sort_by(|a, b| (&a.learner, &a.course).cmp(&(&b.learner, &b.course)));

        let mut outcomes: Vec<ActivityOutcome> = self.outcomes.values().cloned().collect();
        outcomes.sort_by(|a, b| (&a.learner, &a.activity_id).cmp(&(&b.learner, &b.activity_id)));

        let mut badges: Vec<IssuedBadge> = self.badges.values().cloned().collect();
        badges.sort_by(|a, b| (a.issued_at, &a.id).cmp(&(b.issued_at, &b.id)));

        let mut certifications: Vec<IssuedCertification> =
            self.certifications.values().cloned().collect();
        certifications.sort_by(|a, b| (a.issued_at, &a.id).cmp(&(b.issued_at, &b.id)));

        Snapshot {
            nodes,
            edges: self.edges.clone(),
            progress,
            summaries,
            outcomes,
            badge_definitions: self.badge_definitions.values().cloned().collect(),
            badges,
            certification_definitions: self.certification_definitions.values().cloned().collect(),
            certifications,
            events: self.events.clone(),
        }
    }

    fn course_edges(&self, course: &CourseId) -> Vec<DependencyEdge> {
        self.edges
            .iter()
            .filter(|e| {
                self.nodes
                    .get(&e.to)
                    .map(|n| &n.course == course)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: RwLock::new(Tables::from_snapshot(snapshot)),
        }
    }

    /// Capture the current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.read().to_snapshot()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sorted_by_issue<T: Clone, K: Ord>(items: Vec<&T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out: Vec<T> = items.into_iter().cloned().collect();
    out.sort_by_key(|item| key(item));
    out
}

impl ProgressionStore for MemoryStore {
    // ── Graph ────────────────────────────────────────────────────────────────

    fn put_node(&self, node: Node) -> Result<()> {
        self.write().nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn node(&self, id: &NodeId) -> Result<Option<Node>> {
        Ok(self.read().nodes.get(id).cloned())
    }

    fn nodes_in_course(&self, course: &CourseId) -> Result<Vec<Node>> {
        let tables = self.read();
        let mut nodes: Vec<Node> = tables
            .nodes
            .values()
            .filter(|n| &n.course == course)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (a.display_order, &a.id).cmp(&(b.display_order, &b.id)));
        Ok(nodes)
    }

    fn insert_edge(&self, edge: DependencyEdge) -> Result<()> {
        let mut tables = self.write();
        let from = tables.nodes.get(&edge.from);
        let to = tables.nodes.get(&edge.to);
        let course_edges = match to {
            Some(node) => tables.course_edges(&node.course),
            None => Vec::new(),
        };
        validate_edge(&edge, from, to, &course_edges)?;
        tables.edges.push(edge);
        Ok(())
    }

    fn edges_into(&self, node: &NodeId) -> Result<Vec<DependencyEdge>> {
        Ok(self
            .read()
            .edges
            .iter()
            .filter(|e| &e.to == node)
            .cloned()
            .collect())
    }

    fn edges_in_course(&self, course: &CourseId) -> Result<Vec<DependencyEdge>> {
        Ok(self.read().course_edges(course))
    }

    // ── Progress ─────────────────────────────────────────────────────────────

    fn node_progress(&self, learner: &LearnerId, node: &NodeId) -> Result<Option<NodeProgress>> {
        Ok(self
            .read()
            .progress
            .get(&(learner.clone(), node.clone()))
            .cloned())
    }

    fn update_node_progress(
        &self,
        learner: &LearnerId,
        node: &Node,
        apply: &mut dyn FnMut(&mut NodeProgress),
    ) -> Result<NodeProgress> {
        let mut tables = self.write();
        let row = tables
            .progress
            .entry((learner.clone(), node.id.clone()))
            .or_insert_with(|| {
                NodeProgress::new(learner.clone(), node.id.clone(), node.course.clone())
            });
        apply(row);
        Ok(row.clone())
    }

    fn progress_for_learner(&self, learner: &LearnerId) -> Result<Vec<NodeProgress>> {
        let tables = self.read();
        let mut rows: Vec<NodeProgress> = tables
            .progress
            .values()
            .filter(|p| &p.learner == learner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.node.cmp(&b.node));
        Ok(rows)
    }

    fn put_summary(&self, summary: CourseProgressSummary) -> Result<()> {
        self.write()
            .summaries
            .insert((summary.learner.clone(), summary.course.clone()), summary);
        Ok(())
    }

    fn summary(
        &self,
        learner: &LearnerId,
        course: &CourseId,
    ) -> Result<Option<CourseProgressSummary>> {
        Ok(self
            .read()
            .summaries
            .get(&(learner.clone(), course.clone()))
            .cloned())
    }

    // ── Activity outcomes ────────────────────────────────────────────────────

    fn put_outcome(&self, outcome: ActivityOutcome) -> Result<()> {
        self.write().outcomes.insert(
            (outcome.learner.clone(), outcome.activity_id.clone()),
            outcome,
        );
        Ok(())
    }

    fn outcome(
        &self,
        learner: &LearnerId,
        activity: &ActivityId,
    ) -> Result<Option<ActivityOutcome>> {
        Ok(self
            .read()
            .outcomes
            .get(&(learner.clone(), activity.clone()))
            .cloned())
    }

    fn outcomes_for_learner(&self, learner: &LearnerId) -> Result<Vec<ActivityOutcome>> {
        let tables = self.read();
        let matching: Vec<&ActivityOutcome> = tables
            .outcomes
            .values()
            .filter(|o| &o.learner == learner)
            .collect();
        Ok(sorted_by_issue(matching, |o| o.completed_at))
    }

    // ── Badges ───────────────────────────────────────────────────────────────

    fn put_badge_definition(&self, definition: BadgeDefinition) -> Result<()> {
        self.write()
            .badge_definitions
            .insert(definition.id.clone(), definition);
        Ok(())
    }

    fn badge_definition(&self, id: &BadgeDefinitionId) -> Result<Option<BadgeDefinition>> {
        Ok(self.read().badge_definitions.get(id).cloned())
    }

    fn badge_definitions(&self) -> Result<Vec<BadgeDefinition>> {
        Ok(self.read().badge_definitions.values().cloned().collect())
    }

    fn insert_badge_if_absent(&self, badge: IssuedBadge) -> Result<bool> {
        let mut tables = self.write();
        let key = (badge.learner.clone(), badge.definition.clone());
        if tables.active_badges.contains_key(&key) {
            return Ok(false);
        }
        if tables.badges.contains_key(&badge.id) {
            return Err(ProgressionError::StorageError(format!(
                "duplicate badge id {}",
                badge.id
            )));
        }
        if badge.status == CredentialStatus::Active {
            tables.active_badges.insert(key, badge.id.clone());
        }
        tables.badges.insert(badge.id.clone(), badge);
        Ok(true)
    }

    fn badge(&self, id: &BadgeId) -> Result<Option<IssuedBadge>> {
        Ok(self.read().badges.get(id).cloned())
    }

    fn active_badge(
        &self,
        learner: &LearnerId,
        definition: &BadgeDefinitionId,
    ) -> Result<Option<IssuedBadge>> {
        let tables = self.read();
        Ok(tables
            .active_badges
            .get(&(learner.clone(), definition.clone()))
            .and_then(|id| tables.badges.get(id))
            .cloned())
    }

    fn badges_for_learner(&self, learner: &LearnerId) -> Result<Vec<IssuedBadge>> {
        let tables = self.read();
        let matching: Vec<&IssuedBadge> = tables
            .badges
            .values()
            .filter(|b| &b.learner == learner)
            .collect();
        Ok(sorted_by_issue(matching, |b| (b.issued_at, b.id.clone())))
    }

    fn active_badges(&self) -> Result<Vec<IssuedBadge>> {
        let tables = self.read();
        let matching: Vec<&IssuedBadge> = tables
            .active_badges
            .values()
            .filter_map(|id| tables.badges.get(id))
            .collect();
        Ok(sorted_by_issue(matching, |b| (b.issued_at, b.id.clone())))
    }

    fn transition_badge(
        &self,
        id: &BadgeId,
        status: CredentialStatus,
        reason: Option<String>,
        at: u64,
    ) -> Result<Option<IssuedBadge>> {
        let mut tables = self.write();
        let badge = tables
            .badges
            .get_mut(id)
            .ok_or_else(|| ProgressionError::NotFound(format!("badge {id}")))?;
        if badge.status != CredentialStatus::Active || status == CredentialStatus::Active {
            return Ok(None);
        }
        badge.status = status;
        badge.revocation_reason = reason;
        badge.status_changed_at = Some(at);
        let updated = badge.clone();
        tables
            .active_badges
            .remove(&(updated.learner.clone(), updated.definition.clone()));
        Ok(Some(updated))
    }

    // ── Certifications ───────────────────────────────────────────────────────

    fn put_certification_definition(&self, definition: CertificationDefinition) -> Result<()> {
        self.write()
            .certification_definitions
            .insert(definition.id.clone(), definition);
        Ok(())
    }

    fn certification_definition(
        &self,
        id: &CertificationDefinitionId,
    ) -> Result<Option<CertificationDefinition>> {
        Ok(self.read().certification_definitions.get(id).cloned())
    }

    fn certification_definitions(&self) -> Result<Vec<CertificationDefinition>> {
        Ok(self
            .read()
            .certification_definitions
            .values()
            .cloned()
            .collect())
    }

    fn insert_certification_if_absent(&self, certification: IssuedCertification) -> Result<bool> {
        let mut tables = self.write();
        let key = (
            certification.learner.clone(),
            certification.definition.clone(),
        );
        if tables.active_certifications.contains_key(&key) {
            return Ok(false);
        }
        if tables.certifications.contains_key(&certification.id)
            || tables
                .certifications_by_code
                .contains_key(&certification.verification_code)
        {
            return Err(ProgressionError::StorageError(format!(
                "duplicate certification id or code for {}",
                certification.id
            )));
        }
        if certification.status == CredentialStatus::Active {
            tables
                .active_certifications
                .insert(key, certification.id.clone());
        }
        tables.certifications_by_code.insert(
            certification.verification_code.clone(),
            certification.id.clone(),
        );
        tables
            .certifications
            .insert(certification.id.clone(), certification);
        Ok(true)
    }

    fn certification(&self, id: &CertificationId) -> Result<Option<IssuedCertification>> {
        Ok(self.read().certifications.get(id).cloned())
    }

    fn certification_by_code(&self, code: &str) -> Result<Option<IssuedCertification>> {
        let tables = self.read();
        Ok(tables
            .certifications_by_code
            .get(code)
            .and_then(|id| tables.certifications.get(id))
            .cloned())
    }

    fn active_certification(
        &self,
        learner: &LearnerId,
        definition: &CertificationDefinitionId,
    ) -> Result<Option<IssuedCertification>> {
        let tables = self.read();
        Ok(tables
            .active_certifications
            .get(&(learner.clone(), definition.clone()))
            .and_then(|id| tables.certifications.get(id))
            .cloned())
    }

    fn certifications_for_learner(&self, learner: &LearnerId) -> Result<Vec<IssuedCertification>> {
        let tables = self.read();
        let matching: Vec<&IssuedCertification> = tables
            .certifications
            .values()
            .filter(|c| &c.learner == learner)
            .collect();
        Ok(sorted_by_issue(matching, |c| (c.issued_at, c.id.clone())))
    }

    fn active_certifications(&self) -> Result<Vec<IssuedCertification>> {
        let tables = self.read();
        let matching: Vec<&IssuedCertification> = tables
            .active_certifications
            .values()
            .filter_map(|id| tables.certifications.get(id))
            .collect();
        Ok(sorted_by_issue(matching, |c| (c.issued_at, c.id.clone())))
    }

    fn transition_certification(
        &self,
        id: &CertificationId,
        status: CredentialStatus,
        reason: Option<String>,
        at: u64,
    ) -> Result<Option<IssuedCertification>> {
        let mut tables = self.write();
        let cert = tables
            .certifications
            .get_mut(id)
            .ok_or_else(|| ProgressionError::NotFound(format!("certification {id}")))?;
        if cert.status != CredentialStatus::Active || status == CredentialStatus::Active {
            return Ok(None);
        }
        cert.status = status;
        cert.revocation_reason = reason;
        cert.status_changed_at = Some(at);
        let updated = cert.clone();
        tables
            .active_certifications
            .remove(&(updated.learner.clone(), updated.definition.clone()));
        Ok(Some(updated))
    }

    // ── Ledger ───────────────────────────────────────────────────────────────

    fn append_event(&self, mut event: LedgerEvent) -> Result<LedgerEvent> {
        let mut tables = self.write();
        event.sequence = tables.events.last().map(|e| e.sequence + 1).unwrap_or(1);
        tables.events.push(event.clone());
        Ok(event)
    }

    fn events_for(&self, learner: &LearnerId) -> Result<Vec<LedgerEvent>> {
        Ok(self
            .read()
            .events
            .iter()
            .filter(|e| &e.learner == learner)
            .cloned()
            .collect())
    }

    fn events(&self) -> Result<Vec<LedgerEvent>> {
        Ok(self.read().events.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::BadgeLevel;
    use crate::criteria::{CriteriaKind, Evidence};
    use crate::graph::{Combinator, ContentKind};

    fn badge(id: &str, learner: &str, definition: &str) -> IssuedBadge {
        IssuedBadge {
            id: BadgeId::new(id),
            learner: LearnerId::new(learner),
            definition: BadgeDefinitionId::new(definition),
            level: BadgeLevel::Beginner,
            issued_at: 1,
            expires_at: None,
            evidence: Evidence {
                kind: CriteriaKind::CourseHours,
                source_activity: ActivityId::new("a"),
                snapshot: serde_json::Value::Null,
            },
            verification_code: format!("code-{id}"),
            status: CredentialStatus::Active,
            revocation_reason: None,
            status_changed_at: None,
        }
    }

    #[test]
    fn test_insert_badge_if_absent_is_unique_per_definition() {
        let store = MemoryStore::new();
        assert!(store.insert_badge_if_absent(badge("bdg_1", "l1", "d1")).unwrap());
        assert!(!store.insert_badge_if_absent(badge("bdg_2", "l1", "d1")).unwrap());
        assert!(store.insert_badge_if_absent(badge("bdg_3", "l1", "d2")).unwrap());
        assert!(store.insert_badge_if_absent(badge("bdg_4", "l2", "d1")).unwrap());
        assert_eq!(store.badges_for_learner(&LearnerId::new("l1")).unwrap().len(), 2);
    }

    #[test]
    fn test_transition_frees_the_active_slot() {
        let store = MemoryStore::new();
        store.insert_badge_if_absent(badge("bdg_1", "l1", "d1")).unwrap();

        let revoked = store
            .transition_badge(
                &BadgeId::new("bdg_1"),
                CredentialStatus::Revoked,
                Some("misconduct".into()),
                5,
            )
            .unwrap()
            .unwrap();
        assert_eq!(revoked.status, CredentialStatus::Revoked);

        // Second transition is a no-op.
        assert!(store
            .transition_badge(&BadgeId::new("bdg_1"), CredentialStatus::Expired, None, 6)
            .unwrap()
            .is_none());

        assert!(store.insert_badge_if_absent(badge("bdg_2", "l1", "d1")).unwrap());
        let active = store
            .active_badge(&LearnerId::new("l1"), &BadgeDefinitionId::new("d1"))
            .unwrap()
            .unwrap();
        assert_eq!(active.id, BadgeId::new("bdg_2"));
    }

    #[test]
    fn test_insert_edge_validates_atomically() {
        let store = MemoryStore::new();
        for id in ["a", "b"] {
            store
                .put_node(Node::new(id, "c1", ContentKind::Video, id, 0))
                .unwrap();
        }
        store
            .insert_edge(DependencyEdge::new("a", "b", Combinator::All))
            .unwrap();
        assert!(matches!(
            store.insert_edge(DependencyEdge::new("b", "a", Combinator::All)),
            Err(ProgressionError::CycleDetected { .. })
        ));
        assert_eq!(store.edges_in_course(&CourseId::new("c1")).unwrap().len(), 1);
    }

    #[test]
    fn test_event_sequence_increases() {
        let store = MemoryStore::new();
        let make = || {
            LedgerEvent::new(
                crate::ledger::LedgerEventKind::BadgeIssued,
                LearnerId::new("l1"),
                crate::ledger::SubjectKind::Badge,
                "bdg_1",
                serde_json::Value::Null,
            )
        };
        let first = store.append_event(make()).unwrap();
        let second = store.append_event(make()).unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }
}
