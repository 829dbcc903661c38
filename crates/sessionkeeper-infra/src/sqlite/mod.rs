//! SQLite-backed storage.

pub mod pool;
pub mod session;
