//! Data structures for badges.

use serde::{Deserialize, Serialize};

use crate::criteria::{CriteriaSpec, Evidence};
use crate::progress::LearnerId;

crate::string_id! {
    /// Identifier of a badge definition.
    BadgeDefinitionId
}

crate::string_id! {
    /// Identifier of an issued badge (`bdg_…`).
    BadgeId
}

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Badge level, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BadgeLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl BadgeLevel {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

impl std::str::FromStr for BadgeLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            "expert" => Ok(Self::Expert),
            other => Err(format!("unknown badge level '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Credential status
// ---------------------------------------------------------------------------

/// Lifecycle state shared by issued badges and certifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialStatus {
    Active,
    Revoked,
    Expired,
}

impl CredentialStatus {
    /// Return a stable string representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// An administrator-authored badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: BadgeDefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub criteria: CriteriaSpec,
    pub level: BadgeLevel,
    /// Validity of an issued badge in days; `None` never expires.
    #[serde(default)]
    pub expiry_days: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl BadgeDefinition {
    /// Create an active, non-expiring definition.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        criteria: CriteriaSpec,
        level: BadgeLevel,
    ) -> Self {
        Self {
            id: BadgeDefinitionId::new(id),
            name: name.into(),
            description: None,
            criteria,
            level,
            expiry_days: None,
            active: true,
        }
    }

    /// Issued badges expire after `days`.
    pub fn expires_after(mut self, days: u32) -> Self {
        self.expiry_days = Some(days);
        self
    }
}

// ---------------------------------------------------------------------------
// Issued badge
// ---------------------------------------------------------------------------

/// A badge held by a learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedBadge {
    pub id: BadgeId,
    pub learner: LearnerId,
    pub definition: BadgeDefinitionId,
    /// Level of the definition at issuance time.
    pub level: BadgeLevel,
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    pub evidence: Evidence,
    pub verification_code: String,
    pub status: CredentialStatus,
    pub revocation_reason: Option<String>,
    pub status_changed_at: Option<u64>,
}

impl IssuedBadge {
    /// Whether the badge is past its expiry at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(until) if now >= until)
    }

    /// Active and not past expiry.
    pub fn is_current(&self, now: u64) -> bool {
        self.status == CredentialStatus::Active && !self.is_expired_at(now)
    }
}
