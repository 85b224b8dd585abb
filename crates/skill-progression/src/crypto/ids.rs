//! Content-addressed identifiers.
//!
//! Issued records get an ID of the form `{prefix}_{base58}` where the
//! base58 part is the first 16 bytes of a SHA-256 over the record's
//! identifying fields plus fresh randomness.

use sha2::{Digest, Sha256};

use super::random::random_bytes;

/// Build a prefixed identifier from the given identifying parts.
pub fn prefixed_id(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b":");
    }
    hasher.update(random_bytes::<16>());
    let digest = hasher.finalize();
    let encoded = bs58::encode(&digest[..16]).into_string();
    format!("{prefix}_{encoded}")
}
