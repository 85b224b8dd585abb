//! Key derivation using HKDF-SHA256.
//!
//! The configured service secret is never used directly as a hash key. A
//! 32-byte key is derived per purpose, so the same secret can safely key
//! several independent schemes.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{ProgressionError, Result};

/// Derive a 32-byte key from a secret and context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the secret as IKM and
/// the context as info.
pub fn derive_key(secret: &[u8], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, secret);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| ProgressionError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Derivation context for certification signatures.
pub fn certification_context(version: &str) -> String {
    format!("skill-progression/certification-signature/{version}")
}
