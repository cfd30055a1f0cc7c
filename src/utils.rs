//! Hashing helpers.
//!
//! Published rule sets are content-addressed by the SHA3-256 digest of
//! their canonical encoding.

use alloc::string::String;
use sha3::{Digest, Sha3_256};

/// Domain separator for rule set digests.
const RULE_SET_DOMAIN: &[u8] = b"transfer-auth:rule-set:v1";

/// SHA3-256 hash helper.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest of an encoded rule set: H(domain || len || bytes).
pub fn rule_set_digest(encoded: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(RULE_SET_DOMAIN);
    hasher.update((encoded.len() as u64).to_le_bytes());
    hasher.update(encoded);
    hasher.finalize().into()
}

/// Lowercase hex rendering of a digest.
pub fn digest_hex(digest: &[u8; 32]) -> String {
    hex::encode(digest)
}
