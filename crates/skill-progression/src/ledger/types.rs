//! Data structures for the event ledger.

use serde::{Deserialize, Serialize};

use crate::progress::LearnerId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEventKind {
    NodeCompleted,
    BadgeIssued,
    BadgeRevoked,
    BadgeExpired,
    CertificationIssued,
    CertificationRevoked,
    CertificationExpired,
}

impl LedgerEventKind {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::NodeCompleted => "node_completed",
            Self::BadgeIssued => "badge_issued",
            Self::BadgeRevoked => "badge_revoked",
            Self::BadgeExpired => "badge_expired",
            Self::CertificationIssued => "certification_issued",
            Self::CertificationRevoked => "certification_revoked",
            Self::CertificationExpired => "certification_expired",
        }
    }
}

/// Kind of entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    Node,
    Badge,
    Certification,
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log, assigned on append.
    pub sequence: u64,
    pub kind: LedgerEventKind,
    pub learner: LearnerId,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub metadata: serde_json::Value,
    pub timestamp: u64,
}

impl LedgerEvent {
    /// Draft an event; the sequence is assigned by the store.
    pub fn new(
        kind: LedgerEventKind,
        learner: LearnerId,
        subject_kind: SubjectKind,
        subject_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            sequence: 0,
            kind,
            learner,
            subject_kind,
            subject_id: subject_id.into(),
            metadata,
            timestamp: crate::time::now_micros(),
        }
    }
}
