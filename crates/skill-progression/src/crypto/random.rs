//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Generate a public verification code: 16 random bytes, base58 encoded.
pub fn verification_code() -> String {
    bs58::encode(random_bytes::<16>()).into_string()
}

/// Generate a 12-digit uppercase hex serial for certification numbers.
pub fn serial_hex() -> String {
    hex::encode_upper(random_bytes::<6>())
}
