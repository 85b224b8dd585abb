//! Progress aggregator — sole writer of progress rows and course summaries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ThresholdDefaults;
use crate::criteria::LearnerHistory;
use crate::error::{ProgressionError, Result};
use crate::graph::{ContentKind, CourseId, Node, NodeId};
use crate::ledger::{EventLedger, LedgerEvent, LedgerEventKind, LedgerObserver};
use crate::store::ProgressionStore;

use super::types::*;

// ---------------------------------------------------------------------------
// Pure state transitions
// ---------------------------------------------------------------------------

/// Apply one activity submission to a progress row.
///
/// Completion percentage never decreases and a Completed row never
/// regresses. A failed assessment attempt leaves the row retriable.
pub fn apply_activity(
    row: &mut NodeProgress,
    node: &Node,
    threshold: f64,
    input: &ActivityInput,
    now: u64,
) {
    let was_completed = row.is_completed();
    row.attempts = row.attempts.saturating_add(1);
    row.time_spent_secs = row.time_spent_secs.saturating_add(input.time_spent_secs);
    row.updated_at = now;

    match node.kind {
        ContentKind::Video | ContentKind::Package => {
            if let Some(percent) = input.percent {
                row.completion_percent = row.completion_percent.max(percent);
            }
            if !was_completed {
                row.status = if input.percent.is_some() && row.completion_percent >= threshold {
                    ProgressStatus::Completed
                } else {
                    ProgressStatus::InProgress
                };
            }
        }
        ContentKind::Assessment => match input.score {
            Some(score) => {
                row.score = Some(score);
                row.best_score = Some(row.best_score.map_or(score, |best| best.max(score)));
                if !was_completed {
                    if score >= threshold {
                        row.status = ProgressStatus::Completed;
                        row.completion_percent = 100.0;
                    } else {
                        row.status = ProgressStatus::Failed;
                    }
                }
            }
            None => {
                if row.status == ProgressStatus::NotStarted {
                    row.status = ProgressStatus::InProgress;
                }
            }
        },
    }

    if !was_completed && row.is_completed() {
        row.completed_at = Some(now);
    }
}

/// Roll up a learner's rows for one course.
///
/// `nodes` are the course's nodes; rows for other courses are ignored.
pub fn summarize(
    learner: &LearnerId,
    course: &CourseId,
    nodes: &[Node],
    rows: &[NodeProgress],
    certificate_issued: bool,
    now: u64,
) -> CourseProgressSummary {
    let status: HashMap<&NodeId, ProgressStatus> = rows
        .iter()
        .filter(|r| &r.course == course)
        .map(|r| (&r.node, r.status))
        .collect();
    let done = |node: &Node| status.get(&node.id) == Some(&ProgressStatus::Completed);

    let total = nodes.len() as u32;
    let completed = nodes.iter().filter(|n| done(n)).count() as u32;
    let overall_percent = if total == 0 {
        0
    } else {
        (f64::from(completed) * 100.0 / f64::from(total)).round() as u8
    };
    let final_exam_eligible = nodes.iter().filter(|n| !n.final_exam).all(done);

    CourseProgressSummary {
        learner: learner.clone(),
        course: course.clone(),
        total_nodes: total,
        completed_nodes: completed,
        overall_percent,
        final_exam_eligible,
        certificate_issued,
        updated_at: now,
    }
}

fn validate_input(input: &ActivityInput) -> Result<()> {
    for (name, value) in [("percent", input.percent), ("score", input.score)] {
        if let Some(v) = value {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(ProgressionError::InvalidOutcome(format!(
                    "{name} must be within 0-100, got {v}"
                )));
            }
        }
    }
    if input.percent.is_none() && input.score.is_none() && input.time_spent_secs == 0 {
        return Err(ProgressionError::InvalidOutcome(
            "activity carries no percent, score or time".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregator service
// ---------------------------------------------------------------------------

/// What one `record_activity` call produced.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub progress: NodeProgress,
    /// Set when the node is Completed after this submission.
    pub outcome: Option<ActivityOutcome>,
    /// The submission moved the node to Completed.
    pub newly_completed: bool,
}

/// Writes node progress and course summaries.
pub struct ProgressAggregator {
    store: Arc<dyn ProgressionStore>,
    thresholds: ThresholdDefaults,
}

impl ProgressAggregator {
    /// Create an aggregator with the given default thresholds.
    pub fn new(store: Arc<dyn ProgressionStore>, thresholds: ThresholdDefaults) -> Self {
        Self { store, thresholds }
    }

    /// Effective threshold of a node.
    pub fn threshold_for(&self, node: &Node) -> f64 {
        node.completion_threshold
            .unwrap_or_else(|| self.thresholds.for_kind(node.kind))
    }

    /// Record an activity submission against a node.
    pub fn record_activity(
        &self,
        learner: &LearnerId,
        node_id: &NodeId,
        input: &ActivityInput,
    ) -> Result<ActivityRecord> {
        validate_input(input)?;
        let node = self
            .store
            .node(node_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("node {node_id}")))?;

        let threshold = self.threshold_for(&node);
        let now = crate::time::now_micros();
        let mut newly_completed = false;
        let progress = self.store.update_node_progress(learner, &node, &mut |row| {
            let before = row.status;
            apply_activity(row, &node, threshold, input, now);
            newly_completed = before != ProgressStatus::Completed && row.is_completed();
        })?;

        log::debug!(
            "{learner} on {node_id}: {} ({:.0}%)",
            progress.status.as_tag(),
            progress.completion_percent
        );

        let outcome = if progress.is_completed() {
            let outcome = outcome_for(&node, &progress, input, now);
            self.store.put_outcome(outcome.clone())?;
            Some(outcome)
        } else {
            None
        };

        self.refresh_summary(learner, &node.course)?;

        Ok(ActivityRecord {
            progress,
            outcome,
            newly_completed,
        })
    }

    /// Recompute and store the summary for (learner, course).
    pub fn refresh_summary(
        &self,
        learner: &LearnerId,
        course: &CourseId,
    ) -> Result<CourseProgressSummary> {
        let nodes = self.store.nodes_in_course(course)?;
        let rows = self.store.progress_for_learner(learner)?;
        let certificate_issued = self.holds_course_certificate(learner, course)?;
        let summary = summarize(
            learner,
            course,
            &nodes,
            &rows,
            certificate_issued,
            crate::time::now_micros(),
        );
        self.store.put_summary(summary.clone())?;
        Ok(summary)
    }

    /// Stored summary, computing it on first access.
    pub fn summary(&self, learner: &LearnerId, course: &CourseId) -> Result<CourseProgressSummary> {
        match self.store.summary(learner, course)? {
            Some(summary) => Ok(summary),
            None => self.refresh_summary(learner, course),
        }
    }

    /// Accumulated learning time across node progress and external outcomes.
    pub fn history(&self, learner: &LearnerId) -> Result<LearnerHistory> {
        let node_secs: u64 = self
            .store
            .progress_for_learner(learner)?
            .iter()
            .map(|p| p.time_spent_secs)
            .sum();
        let external_secs: u64 = self
            .store
            .outcomes_for_learner(learner)?
            .iter()
            .filter(|o| o.node.is_none())
            .map(|o| o.time_spent_secs)
            .sum();
        Ok(LearnerHistory::from_secs(node_secs + external_secs))
    }

    fn holds_course_certificate(&self, learner: &LearnerId, course: &CourseId) -> Result<bool> {
        let now = crate::time::now_micros();
        for cert in self.store.certifications_for_learner(learner)? {
            if !cert.is_current(now) {
                continue;
            }
            let definition = self.store.certification_definition(&cert.definition)?;
            if definition.and_then(|d| d.course).as_ref() == Some(course) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn outcome_for(
    node: &Node,
    progress: &NodeProgress,
    input: &ActivityInput,
    now: u64,
) -> ActivityOutcome {
    let kind = match node.kind {
        ContentKind::Assessment if node.final_exam => ActivityKind::Assessment,
        ContentKind::Assessment => ActivityKind::Quiz,
        ContentKind::Video | ContentKind::Package => ActivityKind::Lesson,
    };
    ActivityOutcome {
        learner: progress.learner.clone(),
        activity_id: ActivityId::new(node.id.as_str()),
        kind,
        title: node.title.clone(),
        category: node.category.clone(),
        node: Some(node.id.clone()),
        percent: Some(progress.completion_percent),
        // Completed rows keep the best attempt, not the latest one.
        score: progress.best_score.or(input.score),
        time_spent_secs: progress.time_spent_secs,
        completed_at: progress.completed_at.unwrap_or(now),
    }
}

// The summary's certificate flag follows certification lifecycle events.
impl LedgerObserver for ProgressAggregator {
    fn on_event(&self, event: &LedgerEvent, _ledger: &EventLedger) {
        if !matches!(
            event.kind,
            LedgerEventKind::CertificationIssued
                | LedgerEventKind::CertificationRevoked
                | LedgerEventKind::CertificationExpired
        ) {
            return;
        }
        let Some(course) = event.metadata.get("course").and_then(|c| c.as_str()) else {
            return;
        };
        if let Err(e) = self.refresh_summary(&event.learner, &CourseId::new(course)) {
            log::error!(
                "failed to refresh summary of {} for course {course}: {e}",
                event.learner
            );
        }
    }
}
