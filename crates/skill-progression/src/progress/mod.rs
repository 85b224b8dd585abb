//! Progress aggregation — raw activity signals to completion state.
//!
//! The progress module provides:
//! - Per-(learner, node) progress rows with monotonic completion
//! - Stored activity outcomes feeding badge evaluation
//! - Per-(learner, course) summaries with final-exam eligibility
//! - The aggregator, sole writer of progress rows and summaries

pub mod aggregator;
pub mod types;

pub use types::{
    ActivityId, ActivityInput, ActivityKind, ActivityOutcome, CourseProgressSummary, LearnerId,
    NodeProgress, ProgressStatus,
};

pub use aggregator::{apply_activity, summarize, ProgressAggregator};
