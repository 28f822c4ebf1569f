//! Server-to-server request authentication
//!
//! Every peer call carries an HMAC-SHA256 signature over the exact raw
//! request body, keyed by the connection's shared secret. Verification is
//! constant-time via `Mac::verify_slice`; a signature over any mutated byte
//! sequence fails.
//!
//! # Headers
//!
//! - `x-sync-signature`: lowercase hex HMAC-SHA256 of the raw body
//! - `x-sync-connection-id`: connection UUID
//!
//! This module contains only pure functions - no HTTP framework
//! dependencies. Middleware lives in the service crate.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature header name
pub const SIGNATURE_HEADER: &str = "x-sync-signature";

/// Connection id header name
pub const CONNECTION_HEADER: &str = "x-sync-connection-id";

/// Number of random bytes in a freshly generated shared secret
pub const SECRET_LEN: usize = 32;

/// Alphabet for pairing codes; ambiguous glyphs (0/O, 1/I) omitted
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a pairing code
pub const CODE_LEN: usize = 6;

/// Generate a fresh shared secret, hex-encoded
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a 6-character uppercase pairing code
pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| {
            let mut idx = [0u8; 1];
            rng.fill_bytes(&mut idx);
            CODE_ALPHABET[idx[0] as usize % CODE_ALPHABET.len()] as char
        })
        .collect()
}

/// Sign a raw body with the connection secret (hex-encoded key material)
///
/// Returns the lowercase hex signature for the `x-sync-signature` header.
pub fn sign_body(secret_hex: &str, body: &[u8]) -> String {
    let key = hex::decode(secret_hex).unwrap_or_else(|_| secret_hex.as_bytes().to_vec());
    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a provided signature against the raw body
///
/// Comparison is constant-time. Returns false for malformed hex, wrong
/// length, or any byte mismatch - callers surface all of these identically.
pub fn verify_signature(secret_hex: &str, body: &[u8], provided_hex: &str) -> bool {
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    let key = hex::decode(secret_hex).unwrap_or_else(|_| secret_hex.as_bytes().to_vec());
    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}
