//! SkillProgression — dependency-gated learning paths with automatic,
//! verifiable credentials.
//!
//! Provides course dependency graphs with ALL/ANY unlock rules, monotonic
//! progress aggregation, pluggable badge criteria, certifications issued
//! synchronously when their badges are held, signed verification codes,
//! and an append-only audit ledger.

#[macro_use]
mod macros;

pub mod badge;
pub mod certification;
pub mod config;
pub mod criteria;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod progress;
pub mod store;
pub mod time;
pub mod verify;

// Re-export primary types
pub use config::EngineConfig;
pub use engine::{ExpirySweep, LearnerCredentials, NodeUnlockStatus, ProgressionEngine, UnlockStatus};
pub use error::{ProgressionError, Result};

// Re-export graph types
pub use graph::{AccessDecision, Combinator, ContentKind, CourseId, DependencyEdge, Node, NodeId};

// Re-export progress types
pub use progress::{
    ActivityId, ActivityInput, ActivityKind, ActivityOutcome, CourseProgressSummary, LearnerId,
    NodeProgress, ProgressStatus,
};

// Re-export criteria types
pub use criteria::{CriteriaKind, CriteriaParams, CriteriaSpec, Eligibility, Evidence};

// Re-export credential types
pub use badge::{BadgeDefinition, BadgeDefinitionId, BadgeId, BadgeLevel, CredentialStatus, IssuedBadge};
pub use certification::{
    CertificationDefinition, CertificationDefinitionId, CertificationId, IssuedCertification,
    RequiredBadge,
};

// Re-export ledger, storage and verification types
pub use ledger::{EventLedger, LedgerEvent, LedgerEventKind, LedgerObserver, SubjectKind};
pub use store::{MemoryStore, ProgressionStore};
pub use verify::{VerificationResult, Verifier};
