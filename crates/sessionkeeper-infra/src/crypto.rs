//! SHA-256 payload hashing for backup integrity verification.
//!
//! Implements the `PayloadHasher` trait from `sessionkeeper-core` using
//! the `sha2` crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use sessionkeeper_core::service::hash::PayloadHasher;

/// SHA-256 implementation of `PayloadHasher`.
///
/// Computes lowercase hex-encoded SHA-256 digests of archive payloads.
/// The digest always covers the full pre-chunking archive.
pub struct Sha256PayloadHasher;

impl Sha256PayloadHasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256PayloadHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadHasher for Sha256PayloadHasher {
    fn digest(&self, payload: &[u8]) -> String {
        let digest = Sha256::digest(payload);
        format!("{:x}", digest)
    }
}
