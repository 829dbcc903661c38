//! Lifecycle events raised by the external connection client.

use serde::{Deserialize, Serialize};

/// Events the recovery orchestrator consumes from the connection client.
///
/// Delivered over the broadcast event bus in `sessionkeeper-core`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The client authenticated and finished its own startup.
    Ready,

    /// The client lost its connection to the messaging network.
    Disconnected { reason: String },

    /// Authentication was rejected; the stored session is likely stale.
    AuthFailure { message: String },
}
