//! PayloadHasher trait for computing integrity digests.
//!
//! Defined in sessionkeeper-core so the session store can checksum
//! archives without coupling to a specific algorithm. The
//! `Sha256PayloadHasher` adapter lives in sessionkeeper-infra.

/// Abstraction over payload hashing for integrity verification.
///
/// The digest is always computed over the full pre-chunking archive,
/// never over an individual chunk; restore reassembles before
/// verifying.
pub trait PayloadHasher: Send + Sync {
    /// Compute a hex-encoded digest of the given bytes.
    ///
    /// Pure: same input, same output, no failure modes (the empty
    /// sequence included).
    fn digest(&self, payload: &[u8]) -> String;
}
