//! Public verification of certifications by verification code.
//!
//! A lookup that finds nothing and a record whose signature does not match
//! produce the same [`VerificationResult::invalid`] response, so callers
//! cannot tell a guessed code from a tampered record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::badge::CredentialStatus;
use crate::crypto::signing::CredentialSigner;
use crate::error::Result;
use crate::progress::LearnerId;
use crate::store::ProgressionStore;

/// Outcome of verifying a code. Carries no internal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub certification_name: Option<String>,
    pub holder: Option<LearnerId>,
    /// RFC 3339.
    pub issue_date: Option<String>,
    /// RFC 3339; `None` when the certification never expires.
    pub expiry_date: Option<String>,
    pub status: Option<CredentialStatus>,
}

impl VerificationResult {
    /// The detail-free negative answer.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            certification_name: None,
            holder: None,
            issue_date: None,
            expiry_date: None,
            status: None,
        }
    }
}

/// Verifies certification codes against stored, signed records.
pub struct Verifier {
    store: Arc<dyn ProgressionStore>,
    signer: Arc<CredentialSigner>,
}

impl Verifier {
    pub fn new(store: Arc<dyn ProgressionStore>, signer: Arc<CredentialSigner>) -> Self {
        Self { store, signer }
    }

    /// Verify `code` as of now.
    pub fn verify(&self, code: &str) -> Result<VerificationResult> {
        self.verify_at(code, crate::time::now_micros())
    }

    /// Verify `code` as of `now`.
    ///
    /// Valid means the recomputed signature matches, the status is Active,
    /// and the certification is not past expiry. Genuine records that fail
    /// only on status or expiry still report their details; an Active record
    /// past expiry reports `Expired`.
    pub fn verify_at(&self, code: &str, now: u64) -> Result<VerificationResult> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(VerificationResult::invalid());
        }
        let Some(cert) = self.store.certification_by_code(code)? else {
            log::debug!("verification of unknown code");
            return Ok(VerificationResult::invalid());
        };

        if !self
            .signer
            .verify(&cert.learner, &cert.definition, &cert.verification_code, &cert.signature)
        {
            log::warn!("signature mismatch on certification {}", cert.id);
            return Ok(VerificationResult::invalid());
        }

        let Some(definition) = self.store.certification_definition(&cert.definition)? else {
            log::warn!(
                "certification {} references missing definition {}",
                cert.id,
                cert.definition
            );
            return Ok(VerificationResult::invalid());
        };

        let status = match cert.status {
            CredentialStatus::Active if cert.is_expired_at(now) => CredentialStatus::Expired,
            other => other,
        };

        Ok(VerificationResult {
            valid: status == CredentialStatus::Active,
            certification_name: Some(definition.name),
            holder: Some(cert.learner),
            issue_date: Some(crate::time::micros_to_rfc3339(cert.issued_at)),
            expiry_date: cert.expires_at.map(crate::time::micros_to_rfc3339),
            status: Some(status),
        })
    }
}
