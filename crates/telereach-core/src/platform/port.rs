use async_trait::async_trait;

use crate::domain::{GroupRef, UserId};

use super::types::{GroupHandle, Member, PlatformResult};

/// Hexagonal port for establishing platform connections.
///
/// One connector per application; it carries the API credentials and proxy
/// settings the wire library needs, none of which the core ever sees.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Establish a connection, optionally resuming from a serialized
    /// session token produced by [`PlatformConnection::export_session`].
    ///
    /// A returned connection is *connected*, not necessarily *authorized*;
    /// callers must check [`PlatformConnection::is_authorized`].
    async fn connect(&self, session: Option<&str>) -> PlatformResult<Box<dyn PlatformConnection>>;
}

/// Hexagonal port for one live connection to the platform.
///
/// Mirrors the operations the core consumes from the excluded wire client:
/// authorization, code/password sign-in, group resolution and membership
/// listing, and message delivery. Each method returns the platform's own
/// typed failure taxonomy.
#[async_trait]
pub trait PlatformConnection: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn is_authorized(&self) -> PlatformResult<bool>;

    /// Ask the platform to send a verification code to `phone`.
    async fn request_code(&self, phone: &str) -> PlatformResult<()>;

    /// Submit a verification code. Returns `PasswordNeeded` when the
    /// account has a second factor enabled.
    async fn sign_in_with_code(&self, phone: &str, code: &str) -> PlatformResult<()>;

    /// Submit the second-factor password after `PasswordNeeded`.
    async fn sign_in_with_password(&self, password: &str) -> PlatformResult<()>;

    /// Serialize the live session for persistence across restarts.
    fn export_session(&self) -> String;

    async fn disconnect(&self);

    async fn resolve_group(&self, group: &GroupRef) -> PlatformResult<GroupHandle>;

    async fn join_group(&self, group: &GroupHandle) -> PlatformResult<()>;

    /// One page of the membership list, starting at `offset`.
    async fn participants(
        &self,
        group: &GroupHandle,
        offset: usize,
        limit: usize,
    ) -> PlatformResult<Vec<Member>>;

    async fn send_message(&self, recipient: UserId, text: &str) -> PlatformResult<()>;
}
