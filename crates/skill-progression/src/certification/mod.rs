//! Certifications — badge bundles issued with a signed verification code.
//!
//! The certification module provides:
//! - Certification definitions listing required and optional badges
//! - Eligibility over the learner's current badges, with a minimum level
//! - Signed issuance triggered synchronously by `BadgeIssued` ledger events
//! - Revocation and expiry transitions

pub mod issuance;
pub mod types;

pub use types::{
    CertificationDefinition, CertificationDefinitionId, CertificationId, IssuedCertification,
    RequiredBadge,
};

pub use issuance::{is_eligible, validate_certification_definition, CertificationIssuer};
