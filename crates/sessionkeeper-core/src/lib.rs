//! Session persistence and recovery logic for Sessionkeeper.
//!
//! This crate defines the "ports" (repository, archiver, hasher, and
//! connection-client traits) that the infrastructure layer implements,
//! plus the two orchestration components built on them: `SessionStore`
//! (save/restore/exists/cleanup and the periodic backup schedule) and
//! `RecoveryOrchestrator` (the reconnect/health-check control loop).
//! It depends only on `sessionkeeper-types` -- never on
//! `sessionkeeper-infra` or any database/archive crate.

pub mod chunk;
pub mod event;
pub mod repository;
pub mod service;
