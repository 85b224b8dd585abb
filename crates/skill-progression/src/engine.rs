//! The engine facade wiring graph, progress, issuance and verification.
//!
//! [`ProgressionEngine`] owns one [`EventLedger`] with two observers
//! subscribed in this order:
//!
//! 1. [`CertificationIssuer`] reacts to `BadgeIssued`.
//! 2. [`ProgressAggregator`] refreshes course summaries on certification
//!    lifecycle events.
//!
//! Dispatch is synchronous, so when `record_activity` returns every badge
//! and certification it caused has been issued.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::badge::{validate_badge_definition, BadgeDefinition, BadgeId, BadgeIssuer, IssuedBadge};
use crate::certification::{
    validate_certification_definition, CertificationDefinition, CertificationId,
    CertificationIssuer, IssuedCertification,
};
use crate::config::EngineConfig;
use crate::crypto::signing::CredentialSigner;
use crate::error::{ProgressionError, Result};
use crate::graph::{self, AccessDecision, CourseId, DependencyEdge, Node, NodeId};
use crate::ledger::{EventLedger, LedgerEvent, LedgerEventKind, SubjectKind};
use crate::progress::{
    ActivityInput, ActivityOutcome, CourseProgressSummary, LearnerId, NodeProgress,
    ProgressAggregator, ProgressStatus,
};
use crate::store::ProgressionStore;
use crate::verify::{VerificationResult, Verifier};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Per-node entry of an unlock-status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUnlockStatus {
    pub accessible: bool,
    /// Completion percentage, 0-100.
    pub progress: f64,
    pub completed: bool,
    pub status: ProgressStatus,
    pub missing_requirements: Vec<NodeId>,
}

/// Unlock status of every node in a course for one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockStatus {
    pub course: CourseId,
    pub nodes: BTreeMap<NodeId, NodeUnlockStatus>,
    pub overall_progress: u8,
    pub final_exam_eligible: bool,
}

/// Everything a learner holds, in any status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerCredentials {
    pub badges: Vec<IssuedBadge>,
    pub certifications: Vec<IssuedCertification>,
}

/// Credentials moved to Expired by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub badges: Vec<BadgeId>,
    pub certifications: Vec<CertificationId>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Skill progression and credentialing engine.
pub struct ProgressionEngine {
    store: Arc<dyn ProgressionStore>,
    config: EngineConfig,
    ledger: EventLedger,
    aggregator: Arc<ProgressAggregator>,
    badges: BadgeIssuer,
    certifications: Arc<CertificationIssuer>,
    verifier: Verifier,
}

impl ProgressionEngine {
    /// Build an engine over `store`.
    ///
    /// Fails if the configuration is invalid or the signing key cannot be
    /// derived from the service secret.
    pub fn new(store: Arc<dyn ProgressionStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let signer = Arc::new(CredentialSigner::new(&config.service_secret)?);

        let aggregator = Arc::new(ProgressAggregator::new(store.clone(), config.thresholds()));
        let certifications = Arc::new(CertificationIssuer::new(
            store.clone(),
            signer.clone(),
            config.certification_number_prefix.clone(),
        ));
        let ledger = EventLedger::new(store.clone());
        ledger.subscribe(certifications.clone());
        ledger.subscribe(aggregator.clone());

        Ok(Self {
            badges: BadgeIssuer::new(store.clone(), aggregator.clone()),
            verifier: Verifier::new(store.clone(), signer),
            store,
            config,
            ledger,
            aggregator,
            certifications,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ProgressionStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Authoring ----------------------------------------------------------

    /// Add a node, or re-author an existing one. Only the threshold, title
    /// and category of an existing node may change.
    pub fn add_node(&self, node: Node) -> Result<()> {
        graph::validate_node(&node)?;
        if let Some(existing) = self.store.node(&node.id)? {
            if existing.course != node.course {
                return Err(ProgressionError::InvalidNode(format!(
                    "node {} belongs to course {}, not {}",
                    node.id, existing.course, node.course
                )));
            }
            let changed = [
                ("kind", existing.kind != node.kind),
                ("display_order", existing.display_order != node.display_order),
                ("final_exam", existing.final_exam != node.final_exam),
            ];
            if let Some((field, _)) = changed.iter().find(|(_, differs)| *differs) {
                return Err(ProgressionError::InvalidNode(format!(
                    "node {} already exists; its {field} cannot change",
                    node.id
                )));
            }
        }
        log::debug!("node {} ({}) in course {}", node.id, node.kind.as_tag(), node.course);
        self.store.put_node(node)
    }

    /// Add a dependency edge; rejected if it would close a cycle.
    pub fn add_edge(&self, edge: DependencyEdge) -> Result<()> {
        let (from, to, combinator) = (edge.from.clone(), edge.to.clone(), edge.combinator);
        self.store.insert_edge(edge)?;
        log::debug!("edge {from} -> {to} ({})", combinator.as_tag());
        Ok(())
    }

    /// Add or replace a badge definition after validating its criteria.
    pub fn define_badge(&self, definition: BadgeDefinition) -> Result<()> {
        validate_badge_definition(&definition)?;
        log::info!("badge definition {} ({})", definition.id, definition.level.as_tag());
        self.store.put_badge_definition(definition)
    }

    /// Add or replace a certification definition. Every listed badge
    /// definition must already exist.
    pub fn define_certification(&self, definition: CertificationDefinition) -> Result<()> {
        validate_certification_definition(&definition, self.store.as_ref())?;
        log::info!(
            "certification definition {} ({} badges)",
            definition.id,
            definition.badges.len()
        );
        self.store.put_certification_definition(definition)
    }

    // -- Access -------------------------------------------------------------

    /// Whether `learner` may open `node`.
    pub fn can_access(&self, learner: &LearnerId, node: &NodeId) -> Result<AccessDecision> {
        if self.store.node(node)?.is_none() {
            return Err(ProgressionError::NotFound(format!("node {node}")));
        }
        let incoming = self.store.edges_into(node)?;
        let mut statuses: HashMap<NodeId, ProgressStatus> = HashMap::new();
        for edge in &incoming {
            if let Some(row) = self.store.node_progress(learner, &edge.from)? {
                statuses.insert(edge.from.clone(), row.status);
            }
        }
        Ok(graph::can_access(node, &incoming, |id| {
            statuses.get(id).copied().unwrap_or(ProgressStatus::NotStarted)
        }))
    }

    /// Accessibility and progress of every node in `course`.
    pub fn unlock_status(&self, learner: &LearnerId, course: &CourseId) -> Result<UnlockStatus> {
        let nodes = self.store.nodes_in_course(course)?;
        if nodes.is_empty() {
            return Err(ProgressionError::NotFound(format!("course {course}")));
        }
        let edges = self.store.edges_in_course(course)?;
        let rows: HashMap<NodeId, NodeProgress> = self
            .store
            .progress_for_learner(learner)?
            .into_iter()
            .filter(|p| &p.course == course)
            .map(|p| (p.node.clone(), p))
            .collect();
        let status_of =
            |id: &NodeId| rows.get(id).map(|p| p.status).unwrap_or(ProgressStatus::NotStarted);

        let mut entries = BTreeMap::new();
        for node in &nodes {
            let incoming: Vec<DependencyEdge> =
                edges.iter().filter(|e| e.to == node.id).cloned().collect();
            let decision = graph::can_access(&node.id, &incoming, status_of);
            let row = rows.get(&node.id);
            entries.insert(
                node.id.clone(),
                NodeUnlockStatus {
                    accessible: decision.accessible,
                    progress: row.map(|p| p.completion_percent).unwrap_or(0.0),
                    completed: row.is_some_and(NodeProgress::is_completed),
                    status: status_of(&node.id),
                    missing_requirements: decision.missing_requirements,
                },
            );
        }

        let summary = self.aggregator.refresh_summary(learner, course)?;
        Ok(UnlockStatus {
            course: course.clone(),
            nodes: entries,
            overall_progress: summary.overall_percent,
            final_exam_eligible: summary.final_exam_eligible,
        })
    }

    // -- Activity -----------------------------------------------------------

    /// Record an activity submission against a node.
    ///
    /// Locked nodes are rejected. Once the node is Completed the badge
    /// definitions are evaluated and the certification cascade runs before
    /// this returns; failures past that point are logged, not returned.
    pub fn record_activity(
        &self,
        learner: &LearnerId,
        node: &NodeId,
        input: &ActivityInput,
    ) -> Result<NodeProgress> {
        let access = self.can_access(learner, node)?;
        if !access.accessible {
            return Err(ProgressionError::NodeLocked {
                node: node.clone(),
                missing: access.missing_requirements,
            });
        }

        let record = self.aggregator.record_activity(learner, node, input)?;

        if record.newly_completed {
            log::info!("{learner} completed {node}");
            let event = LedgerEvent::new(
                LedgerEventKind::NodeCompleted,
                learner.clone(),
                SubjectKind::Node,
                node.as_str(),
                json!({
                    "course": record.progress.course.as_str(),
                    "percent": record.progress.completion_percent,
                    "score": record.progress.best_score,
                }),
            );
            if let Err(e) = self.ledger.append(event) {
                log::error!("failed to record completion of {node} by {learner}: {e}");
            }
        }

        if let Some(outcome) = &record.outcome {
            if let Err(e) = self.badges.on_activity_completed(
                learner,
                outcome.kind,
                &outcome.activity_id,
                &self.ledger,
            ) {
                log::error!("badge evaluation failed for {learner} on {node}: {e}");
            }
        }

        Ok(record.progress)
    }

    /// Submit the outcome of an activity that is not a course node and
    /// evaluate badges against it. Returns the badges issued.
    pub fn submit_outcome(&self, outcome: ActivityOutcome) -> Result<Vec<BadgeId>> {
        validate_outcome(&outcome)?;
        // Node outcomes share the (learner, activity) key space.
        if self.store.node(&NodeId::new(outcome.activity_id.as_str()))?.is_some() {
            return Err(ProgressionError::InvalidOutcome(format!(
                "activity {} is a course node; record it as node activity",
                outcome.activity_id
            )));
        }
        let learner = outcome.learner.clone();
        let kind = outcome.kind;
        let activity = outcome.activity_id.clone();
        self.store.put_outcome(outcome)?;
        log::debug!("{learner} submitted {} ({})", activity, kind.as_tag());
        self.badges
            .on_activity_completed(&learner, kind, &activity, &self.ledger)
    }

    /// Stored course summary, computed on first access.
    pub fn summary(&self, learner: &LearnerId, course: &CourseId) -> Result<CourseProgressSummary> {
        self.aggregator.summary(learner, course)
    }

    // -- Credentials --------------------------------------------------------

    /// Every badge and certification of `learner`, oldest first.
    pub fn learner_credentials(&self, learner: &LearnerId) -> Result<LearnerCredentials> {
        Ok(LearnerCredentials {
            badges: self.store.badges_for_learner(learner)?,
            certifications: self.store.certifications_for_learner(learner)?,
        })
    }

    /// Issue every certification `learner` is now eligible for.
    pub fn check_eligibility(&self, learner: &LearnerId) -> Result<Vec<CertificationId>> {
        self.certifications.check_eligibility(learner, &self.ledger)
    }

    pub fn revoke_badge(&self, id: &BadgeId, reason: &str) -> Result<IssuedBadge> {
        self.badges.revoke(id, reason, &self.ledger)
    }

    pub fn revoke_certification(
        &self,
        id: &CertificationId,
        reason: &str,
    ) -> Result<IssuedCertification> {
        self.certifications.revoke(id, reason, &self.ledger)
    }

    /// Move every Active credential past its expiry at `now` to Expired.
    pub fn expire_stale(&self, now: u64) -> Result<ExpirySweep> {
        let sweep = ExpirySweep {
            badges: self.badges.expire_stale(now, &self.ledger)?,
            certifications: self.certifications.expire_stale(now, &self.ledger)?,
        };
        if !sweep.badges.is_empty() || !sweep.certifications.is_empty() {
            log::info!(
                "expired {} badges and {} certifications",
                sweep.badges.len(),
                sweep.certifications.len()
            );
        }
        Ok(sweep)
    }

    /// Public verification of a certification code.
    pub fn verify(&self, code: &str) -> Result<VerificationResult> {
        self.verifier.verify(code)
    }

    /// The learner's audit trail, in append order.
    pub fn learner_ledger(&self, learner: &LearnerId) -> Result<Vec<LedgerEvent>> {
        self.ledger.events_for(learner)
    }
}

fn validate_outcome(outcome: &ActivityOutcome) -> Result<()> {
    if outcome.activity_id.0.trim().is_empty() || outcome.learner.0.trim().is_empty() {
        return Err(ProgressionError::InvalidOutcome(
            "learner and activity ids are required".into(),
        ));
    }
    if outcome.node.is_some() {
        return Err(ProgressionError::InvalidOutcome(format!(
            "activity {} is a course node; record it as node activity",
            outcome.activity_id
        )));
    }
    for (name, value) in [("percent", outcome.percent), ("score", outcome.score)] {
        if let Some(v) = value {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(ProgressionError::InvalidOutcome(format!(
                    "{name} must be within 0-100, got {v}"
                )));
            }
        }
    }
    Ok(())
}
