//! russh-backed connector and session.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive every 30 seconds, no inactivity
//!    timeout so the single session can be reused across door commands.
//! 2. **Connection Establishment**: TCP + SSH handshake bounded by the connect
//!    timeout. The result is connected but unauthenticated.
//! 3. **Authentication**: [`AuthChain`] with keyboard-interactive then password.
//! 4. **Command Execution**: one exec channel per command, stdout and stderr
//!    collected until the channel closes or the command timeout expires.
//!
//! ## Connect Retries
//!
//! With `connect_retries > 0` transient connect failures are retried with
//! exponential backoff and jitter via `backon`. Failures classified as
//! permanent by [`is_retryable_error`] are returned at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{ChannelMsg, Disconnect, client};
use tracing::{debug, error, info, warn};

use super::auth::{AuthChain, AuthStrategy};
use super::config::{DoorConfig, MAX_RETRY_DELAY};
use super::credentials::Secret;
use super::error::{SessionError, is_retryable_error};
use super::session::{CommandOutput, ConnectionState, Connector, RemoteSession, SshClientHandler};

/// Build the russh client configuration.
///
/// Keepalives detect a dead peer; there is no inactivity timeout because the
/// session is meant to outlive individual commands.
pub(crate) fn build_client_config() -> Arc<client::Config> {
    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    })
}

/// Opens [`SshRemoteSession`]s.
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
    connect_retries: u32,
    retry_delay: Duration,
}

impl SshConnector {
    pub fn new(connect_timeout: Duration, connect_retries: u32, retry_delay: Duration) -> Self {
        Self {
            connect_timeout,
            connect_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &DoorConfig) -> Self {
        Self::new(
            config.connect_timeout,
            config.connect_retries,
            config.retry_delay,
        )
    }

    async fn open(
        &self,
        host: &str,
        port: u16,
    ) -> Result<client::Handle<SshClientHandler>, SessionError> {
        let connect_future = client::connect(build_client_config(), (host, port), SshClientHandler);

        tokio::time::timeout(self.connect_timeout, connect_future)
            .await
            .map_err(|_| SessionError::Timeout(self.connect_timeout.as_secs()))?
            .map_err(|e| SessionError::Connect(e.to_string()))
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        identity: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let attempt_counter = AtomicU32::new(0);

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_max_delay(MAX_RETRY_DELAY)
            .with_max_times(self.connect_retries as usize)
            .with_jitter();

        let result = (|| async {
            let attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
            if attempt > 0 {
                warn!("SSH connect retry attempt {} to {}:{}", attempt, host, port);
            }
            self.open(host, port).await
        })
        .retry(backoff)
        .when(|e| is_retryable_error(&e.to_string()))
        .notify(|err, dur| {
            warn!("SSH connect failed: {}. Retrying in {:?}", err, dur);
        })
        .await;

        let attempts = attempt_counter.load(Ordering::SeqCst);
        match result {
            Ok(handle) => {
                info!(
                    "Connected to {}:{} as {} ({} attempt(s))",
                    host, port, identity, attempts
                );
                Ok(Box::new(SshRemoteSession {
                    handle,
                    identity: identity.to_string(),
                    authenticated: false,
                }))
            }
            Err(e) => {
                error!(
                    "SSH connect to {}:{} failed after {} attempt(s): {}",
                    host, port, attempts, e
                );
                Err(e)
            }
        }
    }
}

/// A live russh connection.
pub struct SshRemoteSession {
    handle: client::Handle<SshClientHandler>,
    identity: String,
    authenticated: bool,
}

#[async_trait]
impl RemoteSession for SshRemoteSession {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn state(&self) -> ConnectionState {
        if self.handle.is_closed() {
            ConnectionState::Disconnected
        } else if self.authenticated {
            ConnectionState::Authenticated
        } else {
            ConnectionState::Connected
        }
    }

    async fn authenticate(&mut self, secret: &Secret) -> Result<bool, SessionError> {
        let chain = AuthChain::for_secret(secret);
        self.authenticated = chain.authenticate(&mut self.handle, &self.identity).await?;
        Ok(self.authenticated)
    }

    async fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SessionError> {
        if self.handle.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Channel(format!("Failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Channel(format!("Failed to execute command: {}", e)))?;

        let mut stdout = Vec::with_capacity(256);
        let mut stderr = Vec::new();
        let mut exit_code: Option<u32> = None;

        let result = tokio::time::timeout(timeout, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                    // ext == 1 is stderr in SSH protocol
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        stderr.extend_from_slice(&data)
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                    Some(ChannelMsg::Eof) if exit_code.is_some() => break,
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;

        let timed_out = result.is_err();
        if timed_out {
            warn!(
                "Command timed out after {:?} ({} bytes stdout)",
                timeout,
                stdout.len()
            );
        }

        let _ = channel.close().await;

        debug!(
            "Command finished: exit={:?}, {} bytes stdout, {} bytes stderr",
            exit_code,
            stdout.len(),
            stderr.len()
        );

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            timed_out,
        })
    }

    async fn disconnect(&mut self) {
        self.authenticated = false;
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "Session replaced", "en")
            .await
        {
            warn!("Error during disconnect: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod client_config {
        use super::*;

        #[test]
        fn test_no_inactivity_timeout() {
            let config = build_client_config();
            assert_eq!(config.inactivity_timeout, None);
        }

        #[test]
        fn test_keepalive() {
            let config = build_client_config();
            assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
            assert_eq!(config.keepalive_max, 3);
        }
    }

    mod connector {
        use super::*;

        #[test]
        fn test_from_config() {
            let config = DoorConfig {
                connect_timeout: Duration::from_secs(5),
                connect_retries: 2,
                retry_delay: Duration::from_millis(50),
                ..DoorConfig::default()
            };
            let connector = SshConnector::from_config(&config);
            assert_eq!(connector.connect_timeout, Duration::from_secs(5));
            assert_eq!(connector.connect_retries, 2);
            assert_eq!(connector.retry_delay, Duration::from_millis(50));
        }

        #[tokio::test]
        async fn test_unreachable_host_fails_without_retry() {
            // Port 1 on localhost is refused immediately on any sane machine.
            let connector =
                SshConnector::new(Duration::from_secs(5), 0, Duration::from_millis(10));
            let result = connector.connect("127.0.0.1", 1, "alice").await;
            assert!(result.is_err());
        }
    }
}
