//! HTTP request handlers.

pub mod status;
