//! The session context.
//!
//! A single tokio task owns the one [`RemoteSession`] of the process together
//! with the cached [`Credentials`]. Everything else talks to it through a
//! [`SessionHandle`], which queues requests on an unbounded channel. Requests
//! run one at a time in submission order, so a command never races a
//! reconnect and two commands never interleave on the transport. Replies go
//! back over `oneshot` channels; the caller's task is never blocked by network
//! I/O happening here.
//!
//! # Preparing a session
//!
//! 1. No cached credentials: fail with [`SshErrorKind::CredentialsNotFound`]
//!    without touching any session.
//! 2. Not forced and the cached session is usable: reuse it, no network I/O.
//! 3. Otherwise disconnect and discard the cached session, open a new
//!    transport ([`SshErrorKind::ConnectionFailed`] on failure), authenticate
//!    ([`SshErrorKind::AuthenticationFailed`] unless authorized) and cache it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::config::DoorConfig;
use super::credentials::Credentials;
use super::error::SshErrorKind;
use super::executor::CommandExecutor;
use super::session::{ConnectionState, Connector, RemoteSession};

/// Snapshot of the session context for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub host: String,
    pub port: u16,
    pub state: ConnectionState,
    /// Identity of the cached credentials, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// When the current session was established (RFC3339 format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
}

enum SessionRequest {
    Prepare {
        force: bool,
        reply: oneshot::Sender<Result<(), SshErrorKind>>,
    },
    Execute {
        command: String,
        force: bool,
        reply: oneshot::Sender<Result<Option<String>, SshErrorKind>>,
    },
    SetCredentials(Option<Credentials>),
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Owner of the session and the cached credentials.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    session: Option<Box<dyn RemoteSession>>,
    connected_at: Option<DateTime<Utc>>,
    executor: CommandExecutor,
    requests: mpsc::UnboundedReceiver<SessionRequest>,
}

impl SessionManager {
    /// Start the session context on the current tokio runtime.
    ///
    /// The context lives until every [`SessionHandle`] is dropped; the cached
    /// session is disconnected on the way out.
    pub fn spawn<C>(
        connector: C,
        config: &DoorConfig,
        credentials: Option<Credentials>,
    ) -> SessionHandle
    where
        C: Connector + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let manager = SessionManager {
            connector: Arc::new(connector),
            host: config.host.clone(),
            port: config.port,
            credentials,
            session: None,
            connected_at: None,
            executor: CommandExecutor::new(config.command_timeout),
            requests: rx,
        };

        tokio::spawn(manager.run());

        SessionHandle { tx }
    }

    async fn run(mut self) {
        debug!("Session context started for {}:{}", self.host, self.port);

        while let Some(request) = self.requests.recv().await {
            match request {
                SessionRequest::Prepare { force, reply } => {
                    let _ = reply.send(self.prepare(force).await);
                }
                SessionRequest::Execute {
                    command,
                    force,
                    reply,
                } => {
                    let _ = reply.send(self.execute(&command, force).await);
                }
                SessionRequest::SetCredentials(credentials) => {
                    self.set_credentials(credentials).await;
                }
                SessionRequest::Disconnect { reply } => {
                    self.discard().await;
                    let _ = reply.send(());
                }
                SessionRequest::Status { reply } => {
                    let _ = reply.send(self.status());
                }
            }
        }

        self.discard().await;
        debug!("Session context stopped");
    }

    async fn prepare(&mut self, force: bool) -> Result<(), SshErrorKind> {
        let Some(credentials) = self.credentials.clone() else {
            warn!("No credentials cached; not connecting");
            return Err(SshErrorKind::CredentialsNotFound);
        };

        if !force && self.session.as_ref().is_some_and(|s| s.is_usable()) {
            debug!("Reusing authenticated session");
            return Ok(());
        }

        self.discard().await;

        info!(
            "Connecting to {}:{} as {}{}",
            self.host,
            self.port,
            credentials.identity,
            if force { " (forced)" } else { "" }
        );

        let mut session = self
            .connector
            .connect(&self.host, self.port, &credentials.identity)
            .await
            .map_err(|e| {
                error!("Connection to {} failed: {}", self.host, e);
                SshErrorKind::ConnectionFailed
            })?;

        let authorized = match session.authenticate(&credentials.secret).await {
            Ok(authorized) => authorized && session.is_usable(),
            Err(e) => {
                warn!("Authentication attempt failed: {}", e);
                false
            }
        };

        if !authorized {
            warn!("Remote host rejected {}", credentials.identity);
            session.disconnect().await;
            return Err(SshErrorKind::AuthenticationFailed);
        }

        info!("Session authenticated as {}", credentials.identity);
        self.session = Some(session);
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    async fn execute(&mut self, command: &str, force: bool) -> Result<Option<String>, SshErrorKind> {
        self.prepare(force).await?;

        let Some(session) = self.session.as_deref_mut() else {
            return Ok(None);
        };

        debug!("Running '{}'", command);
        Ok(self.executor.run(session, command).await)
    }

    async fn set_credentials(&mut self, credentials: Option<Credentials>) {
        if self.credentials == credentials {
            return;
        }

        match &credentials {
            Some(c) => info!("Cached credentials updated for {}", c.identity),
            None => info!("Cached credentials cleared"),
        }

        // A session authenticated with the old pair must not outlive it.
        self.discard().await;
        self.credentials = credentials;
    }

    async fn discard(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!("Discarding session for {}", session.identity());
            session.disconnect().await;
        }
        self.connected_at = None;
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            host: self.host.clone(),
            port: self.port,
            state: self
                .session
                .as_ref()
                .map(|s| s.state())
                .unwrap_or(ConnectionState::Disconnected),
            identity: self.credentials.as_ref().map(|c| c.identity.clone()),
            connected_at: self.connected_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Cheap, cloneable entry point into the session context.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionRequest>,
}

impl SessionHandle {
    /// Guarantee a connected and authenticated session, or report why not.
    pub async fn prepare(&self, force: bool) -> Result<(), SshErrorKind> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Prepare { force, reply });
        rx.await.unwrap_or_else(|_| {
            error!("Session context is gone");
            Err(SshErrorKind::ConnectionFailed)
        })
    }

    /// Prepare and run `command` as one step of the session context.
    ///
    /// `Ok(None)` is silence: the command produced no interpretable output.
    pub async fn execute(
        &self,
        command: impl Into<String>,
        force: bool,
    ) -> Result<Option<String>, SshErrorKind> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Execute {
            command: command.into(),
            force,
            reply,
        });
        rx.await.unwrap_or_else(|_| {
            error!("Session context is gone");
            Err(SshErrorKind::ConnectionFailed)
        })
    }

    /// Replace the cached credentials; the next `prepare` sees them.
    pub fn update_credentials(&self, credentials: Credentials) {
        self.send(SessionRequest::SetCredentials(Some(credentials)));
    }

    pub fn clear_credentials(&self) {
        self.send(SessionRequest::SetCredentials(None));
    }

    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Disconnect { reply });
        let _ = rx.await;
    }

    /// `None` once the session context has stopped.
    pub async fn status(&self) -> Option<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Status { reply });
        rx.await.ok()
    }

    fn send(&self, request: SessionRequest) {
        if self.tx.send(request).is_err() {
            error!("Session context is gone; request dropped");
        }
    }
}
