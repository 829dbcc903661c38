//! Status HTTP API.

pub mod handlers;
pub mod router;
