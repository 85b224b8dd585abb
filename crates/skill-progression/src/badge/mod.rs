//! Badges — definitions, issued badges, and the issuance service.
//!
//! The badge module provides:
//! - Badge definitions with criteria, level and optional expiry
//! - At-most-one Active badge per (learner, definition)
//! - Evaluation of every compatible definition on activity completion
//! - Revocation and expiry transitions, each recorded on the ledger

pub mod issuance;
pub mod types;

pub use types::{
    BadgeDefinition, BadgeDefinitionId, BadgeId, BadgeLevel, CredentialStatus, IssuedBadge,
};

pub use issuance::{validate_badge_definition, BadgeIssuer};
