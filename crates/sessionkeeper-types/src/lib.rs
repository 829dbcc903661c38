//! Shared domain types for Sessionkeeper.
//!
//! Pure data: validated identifiers, persistence records, configuration,
//! lifecycle events, and the error taxonomy. No IO, no async.

pub mod config;
pub mod error;
pub mod event;
pub mod session;
