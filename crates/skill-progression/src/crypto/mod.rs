//! Cryptographic primitives for credential issuance.
//!
//! This module provides:
//! - Cryptographically secure random verification codes
//! - HKDF-SHA256 derivation of the signing key from the service secret
//! - Keyed BLAKE3 credential signatures (tamper evidence, not proof of origin)
//! - Content-addressed identifier generation

pub mod derivation;
pub mod ids;
pub mod random;
pub mod signing;
