//! Criteria evaluation — does an activity outcome earn a badge?
//!
//! Evaluators are pure: they read an outcome and the learner's history and
//! return a verdict with evidence. They never fail; malformed criteria
//! simply evaluate to "not eligible" and are logged.

pub mod evaluator;
pub mod types;

pub use types::{CriteriaKind, CriteriaParams, CriteriaSpec, Eligibility, Evidence, LearnerHistory};

pub use evaluator::{
    evaluate, evaluate_assessment_score, evaluate_combined, evaluate_course_hours,
    evaluate_quiz_score, validate_criteria,
};
