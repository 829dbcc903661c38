//! Orchestration services and their adapter ports.
//!
//! Services depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod archive;
pub mod client;
pub mod hash;
pub mod recovery;
pub mod store;
