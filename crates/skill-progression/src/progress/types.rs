//! Data structures for learner progress.

use serde::{Deserialize, Serialize};

use crate::graph::{CourseId, NodeId};

crate::string_id! {
    /// Identifier of a learner.
    LearnerId
}

crate::string_id! {
    /// Identifier of an activity (a node ID for node activities).
    ActivityId
}

// ---------------------------------------------------------------------------
// Node progress
// ---------------------------------------------------------------------------

/// Completion state of a node for one learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
    /// Assessment attempt below threshold; retriable.
    Failed,
}

impl ProgressStatus {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One row per (learner, node).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProgress {
    pub learner: LearnerId,
    pub node: NodeId,
    pub course: CourseId,
    /// 0-100, never decreases.
    pub completion_percent: f64,
    /// Latest assessment score.
    pub score: Option<f64>,
    pub best_score: Option<f64>,
    pub status: ProgressStatus,
    pub attempts: u32,
    pub time_spent_secs: u64,
    pub completed_at: Option<u64>,
    pub updated_at: u64,
}

impl NodeProgress {
    /// Create an untouched progress row.
    pub fn new(learner: LearnerId, node: NodeId, course: CourseId) -> Self {
        Self {
            learner,
            node,
            course,
            completion_percent: 0.0,
            score: None,
            best_score: None,
            status: ProgressStatus::NotStarted,
            attempts: 0,
            time_spent_secs: 0,
            completed_at: None,
            updated_at: 0,
        }
    }

    /// Whether the node is completed.
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

// ---------------------------------------------------------------------------
// Course summary
// ---------------------------------------------------------------------------

/// Materialized per-(learner, course) roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgressSummary {
    pub learner: LearnerId,
    pub course: CourseId,
    pub total_nodes: u32,
    pub completed_nodes: u32,
    /// Rounded to the nearest integer.
    pub overall_percent: u8,
    pub final_exam_eligible: bool,
    pub certificate_issued: bool,
    pub updated_at: u64,
}

// ---------------------------------------------------------------------------
// Activity outcomes
// ---------------------------------------------------------------------------

/// Kind of activity an outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    /// Video or package content.
    Lesson,
    /// Non-final assessment.
    Quiz,
    /// Final assessment.
    Assessment,
}

impl ActivityKind {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Quiz => "quiz",
            Self::Assessment => "assessment",
        }
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lesson" => Ok(Self::Lesson),
            "quiz" => Ok(Self::Quiz),
            "assessment" | "exam" => Ok(Self::Assessment),
            other => Err(format!("unknown activity kind '{other}'")),
        }
    }
}

/// Raw signals submitted by a collaborator for one activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityInput {
    pub percent: Option<f64>,
    pub score: Option<f64>,
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl ActivityInput {
    /// A watch/progress percentage.
    pub fn percent(percent: f64) -> Self {
        Self {
            percent: Some(percent),
            ..Self::default()
        }
    }

    /// An assessment score.
    pub fn score(score: f64) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }

    /// Attach time spent on the activity.
    pub fn with_time(mut self, secs: u64) -> Self {
        self.time_spent_secs = secs;
        self
    }
}

/// A completed activity as seen by badge evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub learner: LearnerId,
    pub activity_id: ActivityId,
    pub kind: ActivityKind,
    pub title: String,
    pub category: Option<String>,
    /// Set when the activity is a node of a course.
    pub node: Option<NodeId>,
    pub percent: Option<f64>,
    pub score: Option<f64>,
    pub time_spent_secs: u64,
    pub completed_at: u64,
}

impl ActivityOutcome {
    /// Build an outcome for an activity that is not a course node.
    pub fn external(
        learner: LearnerId,
        activity_id: impl Into<String>,
        kind: ActivityKind,
        title: impl Into<String>,
    ) -> Self {
        Self {
            learner,
            activity_id: ActivityId::new(activity_id),
            kind,
            title: title.into(),
            category: None,
            node: None,
            percent: None,
            score: None,
            time_spent_secs: 0,
            completed_at: crate::time::now_micros(),
        }
    }

    /// Set the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the time spent.
    pub fn with_time(mut self, secs: u64) -> Self {
        self.time_spent_secs = secs;
        self
    }
}
