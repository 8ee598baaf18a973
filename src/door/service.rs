//! Entry point tying credentials, the session context and door tasks together.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::client::SshConnector;
use super::config::DoorConfig;
use super::credentials::{CredentialStore, Credentials, FileCredentialStore, StoreError};
use super::error::SshErrorKind;
use super::manager::{SessionHandle, SessionManager, SessionStatus};
use super::protocol::{DoorCommandKind, DoorResult};
use super::session::Connector;
use super::task::{Dispatch, DoorTask, TaskError};

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("both an identity and a secret are required")]
    Incomplete,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct DoorService {
    store: Arc<dyn CredentialStore>,
    sessions: SessionHandle,
    retry_reconnect: bool,
}

impl DoorService {
    /// Load stored credentials and start the session context.
    ///
    /// An unreadable store is logged and treated as empty.
    pub fn start<C>(connector: C, store: Arc<dyn CredentialStore>, config: &DoorConfig) -> Self
    where
        C: Connector + 'static,
    {
        let credentials = match store.load() {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Ignoring stored credentials: {}", e);
                None
            }
        };

        match &credentials {
            Some(c) => info!("Starting with stored credentials for {}", c.identity),
            None => info!("Starting without credentials"),
        }

        Self {
            store,
            sessions: SessionManager::spawn(connector, config, credentials),
            retry_reconnect: config.retry_reconnect,
        }
    }

    /// Real SSH transport with credentials in `config.credentials_file`.
    pub fn from_config(config: &DoorConfig) -> Self {
        Self::start(
            SshConnector::from_config(config),
            Arc::new(FileCredentialStore::new(config.credentials_file.clone())),
            config,
        )
    }

    pub fn sessions(&self) -> &SessionHandle {
        &self.sessions
    }

    /// Fresh task bound to this service's session context.
    pub fn task(&self) -> DoorTask {
        DoorTask::new(self.sessions.clone()).reconnect_on_retry(self.retry_reconnect)
    }

    /// Connect ahead of the first command so it does not pay for the handshake.
    pub async fn warm_up(&self) -> Result<(), SshErrorKind> {
        self.sessions.prepare(false).await
    }

    pub async fn connect(&self, force: bool) -> Result<(), SshErrorKind> {
        self.sessions.prepare(force).await
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        self.sessions.status().await
    }

    /// Cache and persist a new pair. The cache is updated even if saving fails.
    pub fn set_credentials(&self, credentials: Credentials) -> Result<(), CredentialsError> {
        if !credentials.is_complete() {
            return Err(CredentialsError::Incomplete);
        }

        self.sessions.update_credentials(credentials.clone());
        self.store.save(&credentials)?;
        Ok(())
    }

    pub fn clear_credentials(&self) -> Result<(), CredentialsError> {
        self.sessions.clear_credentials();
        self.store.clear()?;
        Ok(())
    }

    /// Run an action that needs no further input and wait for its result.
    pub async fn perform(
        &self,
        kind: DoorCommandKind,
        door_id: &str,
    ) -> Result<DoorResult, TaskError> {
        match self.task().execute(kind, door_id)? {
            Dispatch::Sent(completion) => completion.await.ok_or(TaskError::Cancelled),
            Dispatch::NeedsDuration(pending) => {
                pending.dismiss();
                Err(TaskError::DurationRequired)
            }
        }
    }

    /// Leave a corridor or lounge door open for `minutes`.
    ///
    /// Other doors are refused before anything is sent.
    pub async fn leave_open(&self, door_id: &str, minutes: u32) -> Result<DoorResult, TaskError> {
        let task = self.task();

        let mut pending = match task.execute(DoorCommandKind::LeaveOpen, door_id)? {
            Dispatch::NeedsDuration(pending) => pending,
            Dispatch::Sent(completion) => {
                return completion.await.ok_or(TaskError::Cancelled);
            }
        };

        if !pending.door_id().allows_leave_open() {
            let door = pending.door_id().to_string();
            pending.dismiss();
            return Err(TaskError::LeaveOpenNotAllowed(door));
        }

        let completion = pending.leave_open(minutes)?;
        completion.await.ok_or(TaskError::Cancelled)
    }
}
