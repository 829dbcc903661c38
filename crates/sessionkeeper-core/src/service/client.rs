//! ConnectionClient trait for the external messaging client.
//!
//! The client owns the wire protocol and materializes its session state
//! into a local directory; this crate only drives its lifecycle and
//! queries its connection state. Lifecycle events arrive separately via
//! the [`crate::event::EventBus`].

use sessionkeeper_types::error::ClientError;

/// Connection state reported by a live client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Identifier of the authenticated peer/account.
    pub peer_id: String,
}

/// Control surface of the external connection client.
pub trait ConnectionClient: Send + Sync {
    /// Start the client. With a restored session directory in place
    /// this resumes the previous login; without one the client will
    /// require a fresh interactive login.
    fn initialize(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Tear the client down, releasing its hold on the session
    /// directory.
    fn destroy(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Current connection state; `None` while not connected.
    fn connection_info(
        &self,
    ) -> impl std::future::Future<Output = Option<ConnectionInfo>> + Send;
}
