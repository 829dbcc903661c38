//! Infrastructure layer for Sessionkeeper.
//!
//! Contains implementations of the ports defined in `sessionkeeper-core`:
//! SQLite session storage, tar.gz directory archiving, and SHA-256
//! payload hashing.

pub mod archive;
pub mod crypto;
pub mod sqlite;
