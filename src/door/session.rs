//! Session abstractions.
//!
//! # Architecture
//!
//! - [`Connector`] opens a transport to the remote host and hands back a
//!   [`RemoteSession`] that is connected but not yet authenticated.
//! - [`RemoteSession`] is one live connection. Only the session context in
//!   [`crate::door::manager`] ever holds one.
//! - [`SshClientHandler`]: russh client handler that accepts all host keys
//!   (similar to `StrictHostKeyChecking=no` in OpenSSH).
//!
//! The traits exist so the session context can be driven by scripted sessions
//! in tests without any network.

use std::time::Duration;

use async_trait::async_trait;
use russh::{client, keys};
use serde::{Deserialize, Serialize};

use super::credentials::Secret;
use super::error::SessionError;

/// Lifecycle of a [`RemoteSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// Transport is open, no identity has been accepted yet.
    Connected,
    Authenticated,
}

/// Raw result of one command on the remote host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
    /// The command did not finish within its timeout; output may be partial.
    pub timed_out: bool,
}

/// One live connection to the remote host.
#[async_trait]
pub trait RemoteSession: Send {
    /// Identity the session was opened for.
    fn identity(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Connected and authenticated. Anything else must be treated as unusable.
    fn is_usable(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    /// Returns `Ok(false)` when the remote side rejected the secret.
    async fn authenticate(&mut self, secret: &Secret) -> Result<bool, SessionError>;

    async fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SessionError>;

    async fn disconnect(&mut self);
}

/// Opens transports to the remote host.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        identity: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError>;
}

/// Client handler for russh that accepts all host keys.
///
/// # Security Note
///
/// Host key verification against a known_hosts file is not performed.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
