//! Data structures for badge criteria.

use serde::{Deserialize, Serialize};

use crate::progress::{ActivityId, ActivityKind};

/// Which evaluator a badge definition uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriteriaKind {
    AssessmentScore,
    QuizScore,
    CourseHours,
    Combined,
}

impl CriteriaKind {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::AssessmentScore => "assessment_score",
            Self::QuizScore => "quiz_score",
            Self::CourseHours => "course_hours",
            Self::Combined => "combined",
        }
    }

    /// Whether an outcome of `activity` can be judged by this single kind.
    ///
    /// `Combined` is decided from its components, see
    /// [`CriteriaSpec::compatible_with`].
    pub fn accepts(&self, activity: ActivityKind) -> bool {
        match self {
            Self::AssessmentScore => activity == ActivityKind::Assessment,
            Self::QuizScore => activity == ActivityKind::Quiz,
            Self::CourseHours => true,
            Self::Combined => false,
        }
    }
}

/// Parameters shared by all criteria kinds; each kind reads what it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaParams {
    #[serde(default)]
    pub min_score: Option<f64>,
    /// Restrict score criteria to outcomes of this category.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_hours: Option<f64>,
    /// Kinds AND-ed together by `Combined`.
    #[serde(default)]
    pub components: Vec<CriteriaKind>,
}

/// Criteria kind plus parameters, as authored on a badge definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSpec {
    pub kind: CriteriaKind,
    #[serde(default)]
    pub params: CriteriaParams,
}

impl CriteriaSpec {
    /// Minimum assessment score, optionally restricted to a category.
    pub fn assessment_score(min_score: f64, category: Option<&str>) -> Self {
        Self {
            kind: CriteriaKind::AssessmentScore,
            params: CriteriaParams {
                min_score: Some(min_score),
                category: category.map(str::to_string),
                ..CriteriaParams::default()
            },
        }
    }

    /// Minimum quiz score, optionally restricted to a category.
    pub fn quiz_score(min_score: f64, category: Option<&str>) -> Self {
        Self {
            kind: CriteriaKind::QuizScore,
            params: CriteriaParams {
                min_score: Some(min_score),
                category: category.map(str::to_string),
                ..CriteriaParams::default()
            },
        }
    }

    /// Minimum accumulated learning hours.
    pub fn course_hours(min_hours: f64) -> Self {
        Self {
            kind: CriteriaKind::CourseHours,
            params: CriteriaParams {
                min_hours: Some(min_hours),
                ..CriteriaParams::default()
            },
        }
    }

    /// AND of the given component kinds, sharing `params`.
    pub fn combined(components: Vec<CriteriaKind>, params: CriteriaParams) -> Self {
        Self {
            kind: CriteriaKind::Combined,
            params: CriteriaParams {
                components,
                ..params
            },
        }
    }

    /// Whether an outcome of `activity` is relevant to this criteria.
    ///
    /// `Combined` accepts an activity when every component does.
    pub fn compatible_with(&self, activity: ActivityKind) -> bool {
        match self.kind {
            CriteriaKind::Combined => {
                !self.params.components.is_empty()
                    && self.params.components.iter().all(|c| c.accepts(activity))
            }
            kind => kind.accepts(activity),
        }
    }
}

/// Learner-wide aggregates some criteria need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerHistory {
    pub total_hours: f64,
}

impl LearnerHistory {
    /// Build from accumulated seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self {
            total_hours: secs as f64 / 3600.0,
        }
    }
}

/// The scoring data that justified an eligible verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: CriteriaKind,
    pub source_activity: ActivityId,
    pub snapshot: serde_json::Value,
}

/// Verdict of an evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    pub evidence: Option<Evidence>,
}

impl Eligibility {
    /// A negative verdict.
    pub fn not_eligible() -> Self {
        Self {
            eligible: false,
            evidence: None,
        }
    }

    /// A positive verdict with evidence.
    pub fn eligible(evidence: Evidence) -> Self {
        Self {
            eligible: true,
            evidence: Some(evidence),
        }
    }
}
