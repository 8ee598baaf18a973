//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::client;

use crate::door::error::SessionError;
use crate::door::session::SshClientHandler;

/// One way of proving the identity to the SSH server.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected
    /// * `Err(_)` - The attempt itself failed
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError>;

    /// Used for logging.
    fn name(&self) -> &'static str;
}
