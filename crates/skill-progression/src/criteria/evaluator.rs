//! Criteria evaluators — one pure function per criteria kind.

use serde_json::json;

use crate::error::{ProgressionError, Result};
use crate::progress::{ActivityKind, ActivityOutcome};

use super::types::*;

/// Internal verdict: `Err` marks malformed criteria.
type Check = std::result::Result<Eligibility, String>;

// ---------------------------------------------------------------------------
// Write-time validation
// ---------------------------------------------------------------------------

/// Validate criteria when a badge definition is authored.
pub fn validate_criteria(spec: &CriteriaSpec) -> Result<()> {
    check_params(spec.kind, &spec.params).map_err(ProgressionError::InvalidCriteria)
}

fn check_params(kind: CriteriaKind, params: &CriteriaParams) -> std::result::Result<(), String> {
    if let Some(category) = &params.category {
        if category.trim().is_empty() {
            return Err("category filter is empty".into());
        }
    }
    match kind {
        CriteriaKind::AssessmentScore | CriteriaKind::QuizScore => {
            required_score(kind, params).map(|_| ())
        }
        CriteriaKind::CourseHours => required_hours(params).map(|_| ()),
        CriteriaKind::Combined => {
            if params.components.is_empty() {
                return Err("combined criteria has no components".into());
            }
            // Each score kind only matches its own activity kind.
            if params.components.contains(&CriteriaKind::AssessmentScore)
                && params.components.contains(&CriteriaKind::QuizScore)
            {
                return Err(
                    "combined criteria cannot require both assessment_score and quiz_score".into(),
                );
            }
            for (i, component) in params.components.iter().enumerate() {
                if *component == CriteriaKind::Combined {
                    return Err("combined criteria cannot nest combined".into());
                }
                if params.components[..i].contains(component) {
                    return Err(format!(
                        "combined criteria lists {} twice",
                        component.as_tag()
                    ));
                }
                check_params(*component, params)?;
            }
            Ok(())
        }
    }
}

fn required_score(kind: CriteriaKind, params: &CriteriaParams) -> std::result::Result<f64, String> {
    match params.min_score {
        Some(s) if s.is_finite() && (0.0..=100.0).contains(&s) => Ok(s),
        Some(s) => Err(format!("{} min_score must be within 0-100, got {s}", kind.as_tag())),
        None => Err(format!("{} requires min_score", kind.as_tag())),
    }
}

fn required_hours(params: &CriteriaParams) -> std::result::Result<f64, String> {
    match params.min_hours {
        Some(h) if h.is_finite() && h >= 0.0 => Ok(h),
        Some(h) => Err(format!("course_hours min_hours must be >= 0, got {h}")),
        None => Err("course_hours requires min_hours".into()),
    }
}

// ---------------------------------------------------------------------------
// Evaluators
// ---------------------------------------------------------------------------

fn settle(kind: CriteriaKind, outcome: &ActivityOutcome, check: Check) -> Eligibility {
    match check {
        Ok(verdict) => {
            log::debug!(
                "criteria {} on activity {} for {}: eligible={}",
                kind.as_tag(),
                outcome.activity_id,
                outcome.learner,
                verdict.eligible
            );
            verdict
        }
        Err(reason) => {
            log::warn!(
                "malformed {} criteria while evaluating activity {}: {reason}",
                kind.as_tag(),
                outcome.activity_id
            );
            Eligibility::not_eligible()
        }
    }
}

fn score_check(
    kind: CriteriaKind,
    scope: ActivityKind,
    params: &CriteriaParams,
    outcome: &ActivityOutcome,
) -> Check {
    let min_score = required_score(kind, params)?;

    if outcome.kind != scope {
        return Ok(Eligibility::not_eligible());
    }
    if let Some(wanted) = &params.category {
        if outcome.category.as_deref() != Some(wanted.as_str()) {
            return Ok(Eligibility::not_eligible());
        }
    }
    let Some(score) = outcome.score else {
        return Ok(Eligibility::not_eligible());
    };
    if score < min_score {
        return Ok(Eligibility::not_eligible());
    }

    Ok(Eligibility::eligible(Evidence {
        kind,
        source_activity: outcome.activity_id.clone(),
        snapshot: json!({
            "activity_kind": outcome.kind.as_tag(),
            "title": outcome.title,
            "category": outcome.category,
            "score": score,
            "min_score": min_score,
            "completed_at": outcome.completed_at,
        }),
    }))
}

fn hours_check(
    params: &CriteriaParams,
    outcome: &ActivityOutcome,
    history: &LearnerHistory,
) -> Check {
    let min_hours = required_hours(params)?;
    if history.total_hours < min_hours {
        return Ok(Eligibility::not_eligible());
    }
    Ok(Eligibility::eligible(Evidence {
        kind: CriteriaKind::CourseHours,
        source_activity: outcome.activity_id.clone(),
        snapshot: json!({
            "total_hours": history.total_hours,
            "min_hours": min_hours,
            "completed_at": outcome.completed_at,
        }),
    }))
}

/// AssessmentScore: category matches (if set) and score >= min_score.
pub fn evaluate_assessment_score(params: &CriteriaParams, outcome: &ActivityOutcome) -> Eligibility {
    let kind = CriteriaKind::AssessmentScore;
    settle(
        kind,
        outcome,
        score_check(kind, ActivityKind::Assessment, params, outcome),
    )
}

/// QuizScore: as AssessmentScore, scoped to quiz outcomes.
pub fn evaluate_quiz_score(params: &CriteriaParams, outcome: &ActivityOutcome) -> Eligibility {
    let kind = CriteriaKind::QuizScore;
    settle(
        kind,
        outcome,
        score_check(kind, ActivityKind::Quiz, params, outcome),
    )
}

/// CourseHours: accumulated learning hours >= min_hours.
pub fn evaluate_course_hours(
    params: &CriteriaParams,
    outcome: &ActivityOutcome,
    history: &LearnerHistory,
) -> Eligibility {
    settle(
        CriteriaKind::CourseHours,
        outcome,
        hours_check(params, outcome, history),
    )
}

fn combined_check(
    params: &CriteriaParams,
    outcome: &ActivityOutcome,
    history: &LearnerHistory,
) -> Check {
    check_params(CriteriaKind::Combined, params)?;

    let mut snapshots = Vec::with_capacity(params.components.len());
    for component in &params.components {
        let verdict = match component {
            CriteriaKind::AssessmentScore => {
                score_check(*component, ActivityKind::Assessment, params, outcome)?
            }
            CriteriaKind::QuizScore => score_check(*component, ActivityKind::Quiz, params, outcome)?,
            CriteriaKind::CourseHours => hours_check(params, outcome, history)?,
            CriteriaKind::Combined => return Err("combined criteria cannot nest combined".into()),
        };
        match verdict.evidence {
            Some(evidence) if verdict.eligible => snapshots.push(json!({
                "kind": component.as_tag(),
                "snapshot": evidence.snapshot,
            })),
            _ => return Ok(Eligibility::not_eligible()),
        }
    }

    Ok(Eligibility::eligible(Evidence {
        kind: CriteriaKind::Combined,
        source_activity: outcome.activity_id.clone(),
        snapshot: json!({ "components": snapshots }),
    }))
}

/// Combined: logical AND across the configured components.
pub fn evaluate_combined(
    params: &CriteriaParams,
    outcome: &ActivityOutcome,
    history: &LearnerHistory,
) -> Eligibility {
    settle(
        CriteriaKind::Combined,
        outcome,
        combined_check(params, outcome, history),
    )
}

/// Dispatch to the evaluator matching `spec.kind`.
pub fn evaluate(
    spec: &CriteriaSpec,
    outcome: &ActivityOutcome,
    history: &LearnerHistory,
) -> Eligibility {
    match spec.kind {
        CriteriaKind::AssessmentScore => evaluate_assessment_score(&spec.params, outcome),
        CriteriaKind::QuizScore => evaluate_quiz_score(&spec.params, outcome),
        CriteriaKind::CourseHours => evaluate_course_hours(&spec.params, outcome, history),
        CriteriaKind::Combined => evaluate_combined(&spec.params, outcome, history),
    }
}
