//! Content fingerprinting for duplicate detection.

use sha1::{Digest, Sha1};

/// Width of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 40;

/// SHA-1 digest of `bytes`, lowercase hex.
///
/// Depends only on the bytes, never on the submitting user or the time.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}
