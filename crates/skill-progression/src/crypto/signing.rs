//! Keyed-hash credential signatures.
//!
//! A signature is `v1:` followed by the hex BLAKE3 keyed hash of
//! `cert:{learner}:{certification definition}:{verification code}`.
//! The key is derived from the service secret, so anyone holding the
//! secret can mint or check signatures: this is tamper evidence for
//! stored records, not a public-key signature.

use zeroize::Zeroizing;

use crate::certification::CertificationDefinitionId;
use crate::error::Result;
use crate::progress::LearnerId;

use super::derivation::{certification_context, derive_key};

/// Version tag prefixed to every signature produced by this module.
pub const SIGNATURE_VERSION: &str = "v1";

/// Signs and checks certification records with a secret-derived key.
pub struct CredentialSigner {
    key: Zeroizing<[u8; 32]>,
}

impl CredentialSigner {
    /// Derive the signing key from the service secret.
    pub fn new(service_secret: &str) -> Result<Self> {
        let key = derive_key(
            service_secret.as_bytes(),
            &certification_context(SIGNATURE_VERSION),
        )?;
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    fn digest(
        &self,
        learner: &LearnerId,
        certification: &CertificationDefinitionId,
        verification_code: &str,
    ) -> blake3::Hash {
        let message = format!(
            "cert:{}:{}:{}",
            learner.0, certification.0, verification_code
        );
        blake3::keyed_hash(&self.key, message.as_bytes())
    }

    /// Compute the signature for a certification record.
    pub fn sign(
        &self,
        learner: &LearnerId,
        certification: &CertificationDefinitionId,
        verification_code: &str,
    ) -> String {
        let hash = self.digest(learner, certification, verification_code);
        format!("{SIGNATURE_VERSION}:{}", hash.to_hex())
    }

    /// Check a stored signature against the recomputed one.
    ///
    /// The hash comparison is constant-time. Unknown versions and malformed
    /// hex simply fail.
    pub fn verify(
        &self,
        learner: &LearnerId,
        certification: &CertificationDefinitionId,
        verification_code: &str,
        signature: &str,
    ) -> bool {
        let Some((version, hex_part)) = signature.split_once(':') else {
            return false;
        };
        if version != SIGNATURE_VERSION {
            return false;
        }
        match blake3::Hash::from_hex(hex_part) {
            Ok(stored) => stored == self.digest(learner, certification, verification_code),
            Err(_) => false,
        }
    }
}
