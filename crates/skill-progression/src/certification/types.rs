//! Data structures for certifications.

use serde::{Deserialize, Serialize};

use crate::badge::{BadgeDefinitionId, BadgeLevel, CredentialStatus};
use crate::graph::CourseId;
use crate::progress::LearnerId;

crate::string_id! {
    /// Identifier of a certification definition.
    CertificationDefinitionId
}

crate::string_id! {
    /// Identifier of an issued certification (`cert_…`).
    CertificationId
}

/// A badge listed by a certification definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredBadge {
    pub badge: BadgeDefinitionId,
    /// Optional badges only matter for the minimum-level check.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// An administrator-authored certification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationDefinition {
    pub id: CertificationDefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Course whose summary reports `certificate_issued`.
    #[serde(default)]
    pub course: Option<CourseId>,
    /// Ordered badge list.
    pub badges: Vec<RequiredBadge>,
    #[serde(default)]
    pub min_badge_level: Option<BadgeLevel>,
    /// Validity in days; `None` never expires.
    #[serde(default)]
    pub validity_days: Option<u32>,
    pub issuing_authority: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CertificationDefinition {
    /// Create an active, non-expiring definition with no badges.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        issuing_authority: impl Into<String>,
    ) -> Self {
        Self {
            id: CertificationDefinitionId::new(id),
            name: name.into(),
            description: None,
            course: None,
            badges: Vec::new(),
            min_badge_level: None,
            validity_days: None,
            issuing_authority: issuing_authority.into(),
            active: true,
        }
    }

    /// Append a required badge.
    pub fn require(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(RequiredBadge {
            badge: BadgeDefinitionId::new(badge),
            required: true,
        });
        self
    }

    /// Append an optional badge.
    pub fn optional(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(RequiredBadge {
            badge: BadgeDefinitionId::new(badge),
            required: false,
        });
        self
    }

    /// Require every relevant held badge to be at least `level`.
    pub fn min_level(mut self, level: BadgeLevel) -> Self {
        self.min_badge_level = Some(level);
        self
    }

    /// Issued certifications expire after `days`.
    pub fn valid_for(mut self, days: u32) -> Self {
        self.validity_days = Some(days);
        self
    }

    /// Tie the certification to a course.
    pub fn for_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(CourseId::new(course));
        self
    }

    /// Whether `badge` is listed (required or optional).
    pub fn lists(&self, badge: &BadgeDefinitionId) -> bool {
        self.badges.iter().any(|b| &b.badge == badge)
    }
}

/// A certification held by a learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCertification {
    pub id: CertificationId,
    pub learner: LearnerId,
    pub definition: CertificationDefinitionId,
    /// Human-facing number, e.g. `CERT-20240301-7F3A9C2E1B4D`.
    pub certification_number: String,
    pub verification_code: String,
    pub signature: String,
    /// Badge definitions held (Active) at issuance time.
    pub badge_snapshot: Vec<BadgeDefinitionId>,
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    pub status: CredentialStatus,
    pub revocation_reason: Option<String>,
    pub status_changed_at: Option<u64>,
}

impl IssuedCertification {
    /// Whether the certification is past its expiry at `now`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(until) if now >= until)
    }

    /// Active and not past expiry.
    pub fn is_current(&self, now: u64) -> bool {
        self.status == CredentialStatus::Active && !self.is_expired_at(now)
    }
}
