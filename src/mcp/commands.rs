//! MCP door tools.
//!
//! - `door_open` / `door_close` / `door_status`: One door action, waits for the result
//! - `door_leave_open`: Keep a corridor or lounge door open for a number of minutes
//! - `door_connect`: Establish (or force a fresh) session ahead of time
//! - `door_set_credentials` / `door_clear_credentials`: Manage the stored identity and secret
//! - `door_session_status`: Inspect the session context

use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text, tool::StructuredContent};
use tracing::{error, info, warn};

use super::types::{
    CredentialsResponse, DoorActionResponse, DoorConnectResponse, SessionStatusResponse,
    describe_error,
};
use crate::door::service::CredentialsError;
use crate::door::{Credentials, DoorCommandKind, DoorService, TaskError};

/// Door tools bound to one [`DoorService`].
///
/// Every MCP session of the server shares the same service, and therefore the
/// same SSH session and credentials.
#[derive(Clone)]
pub struct McpDoorCommands {
    service: Arc<DoorService>,
}

impl McpDoorCommands {
    pub fn new(service: Arc<DoorService>) -> Self {
        Self { service }
    }

    async fn run_action(
        &self,
        kind: DoorCommandKind,
        door_id: &str,
    ) -> Result<DoorActionResponse, String> {
        info!("Door {} requested for '{}'", kind, door_id);

        let result = self
            .service
            .perform(kind, door_id)
            .await
            .map_err(task_error)?;

        DoorActionResponse::from_result(door_id, kind, None, result)
    }

    async fn run_leave_open(
        &self,
        door_id: &str,
        minutes: u32,
    ) -> Result<DoorActionResponse, String> {
        info!("Leave-open requested for '{}' ({} min)", door_id, minutes);

        let result = self
            .service
            .leave_open(door_id, minutes)
            .await
            .map_err(task_error)?;

        DoorActionResponse::from_result(door_id, DoorCommandKind::LeaveOpen, Some(minutes), result)
    }

    async fn connect(&self, force: bool) -> Result<DoorConnectResponse, String> {
        if let Err(kind) = self.service.connect(force).await {
            warn!("Connect failed: {}", kind);
            return Err(describe_error(kind));
        }

        let status = self
            .service
            .status()
            .await
            .ok_or_else(|| "Session context is not running".to_string())?;

        Ok(DoorConnectResponse {
            message: format!(
                "Connected to {}:{} as {}",
                status.host,
                status.port,
                status.identity.as_deref().unwrap_or("<unknown>")
            ),
            host: status.host,
            port: status.port,
            identity: status.identity,
            forced: force,
        })
    }

    fn set_credentials(&self, identity: String, secret: String) -> CredentialsResponse {
        let identity = identity.trim().to_string();
        let (persisted, message) =
            match self.service.set_credentials(Credentials::new(identity.clone(), secret)) {
                Ok(()) => (true, format!("Credentials saved for {}", identity)),
                Err(CredentialsError::Incomplete) => {
                    return CredentialsResponse {
                        identity: None,
                        persisted: false,
                        message: CredentialsError::Incomplete.to_string(),
                    };
                }
                Err(e) => {
                    error!("Could not persist credentials: {}", e);
                    (
                        false,
                        format!("Credentials cached for {} but not saved: {}", identity, e),
                    )
                }
            };

        CredentialsResponse {
            identity: Some(identity),
            persisted,
            message,
        }
    }
}

fn task_error(e: TaskError) -> String {
    match e {
        TaskError::LeaveOpenNotAllowed(door) => format!(
            "Door {} cannot be left open. Only doors that belong to corridors or lounges can be opened for longer than the default.",
            door
        ),
        other => other.to_string(),
    }
}

#[Tools]
impl McpDoorCommands {
    /// Open a door for the default amount of time.
    async fn door_open(
        &self,
        /// Door identifier, e.g. "A1CE" (case-insensitive, surrounding whitespace ignored)
        door_id: String,
    ) -> Result<StructuredContent<DoorActionResponse>, String> {
        self.run_action(DoorCommandKind::Open, &door_id)
            .await
            .map(StructuredContent)
    }

    /// Close a door.
    async fn door_close(
        &self,
        /// Door identifier, e.g. "A1CE" (case-insensitive, surrounding whitespace ignored)
        door_id: String,
    ) -> Result<StructuredContent<DoorActionResponse>, String> {
        self.run_action(DoorCommandKind::Close, &door_id)
            .await
            .map(StructuredContent)
    }

    /// Query whether a door is opened or closed.
    async fn door_status(
        &self,
        /// Door identifier, e.g. "A1CE" (case-insensitive, surrounding whitespace ignored)
        door_id: String,
    ) -> Result<StructuredContent<DoorActionResponse>, String> {
        self.run_action(DoorCommandKind::Status, &door_id)
            .await
            .map(StructuredContent)
    }

    /// Keep a door open for a number of minutes.
    ///
    /// Only corridor and lounge doors (ids matching `[AB][1-5]C[EW]`, e.g. "A1CE")
    /// support this; other doors are refused without contacting the server.
    async fn door_leave_open(
        &self,
        /// Door identifier, e.g. "A1CE"
        door_id: String,
        /// How long to keep the door open, in minutes (at least 1)
        minutes: u32,
    ) -> Result<StructuredContent<DoorActionResponse>, String> {
        self.run_leave_open(&door_id, minutes)
            .await
            .map(StructuredContent)
    }

    /// Connect and authenticate ahead of the first door action.
    ///
    /// Door actions connect on demand, so this is optional. Use `force=true` to
    /// drop the current session and open a new one.
    async fn door_connect(
        &self,
        /// Replace an existing session even if it still looks healthy (default: false)
        force: Option<bool>,
    ) -> Result<StructuredContent<DoorConnectResponse>, String> {
        self.connect(force.unwrap_or(false))
            .await
            .map(StructuredContent)
    }

    /// Store the username and password used to log in to the door host.
    ///
    /// Takes effect for the next door action; an open session authenticated
    /// with other credentials is closed.
    async fn door_set_credentials(
        &self,
        /// Username on the door host
        identity: String,
        /// Password for that username
        secret: String,
    ) -> StructuredContent<CredentialsResponse> {
        StructuredContent(self.set_credentials(identity, secret))
    }

    /// Forget the stored credentials and close the session.
    async fn door_clear_credentials(&self) -> Result<Text<String>, String> {
        self.service.clear_credentials().map_err(|e| {
            error!("Could not clear credentials: {}", e);
            e.to_string()
        })?;
        Ok(Text("Credentials cleared".to_string()))
    }

    /// Show the host, connection state and identity of the shared session.
    async fn door_session_status(&self) -> Result<StructuredContent<SessionStatusResponse>, String> {
        self.service
            .status()
            .await
            .map(|status| StructuredContent(status.into()))
            .ok_or_else(|| "Session context is not running".to_string())
    }
}
