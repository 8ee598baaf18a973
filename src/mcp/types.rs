//! Serializable response types for the MCP door tools.
//!
//! All types implement `Serialize`, `Deserialize`, and `JsonSchema` so they can
//! be returned as structured tool content.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::door::session::ConnectionState;
use crate::door::{DoorCommandKind, DoorId, DoorResult, ErrorCategory, SessionStatus, SshErrorKind};

/// Outcome of a door action that reached the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DoorOutcome {
    /// The remote side reported a status (see `status`)
    Done,
    /// The remote side does not know the door
    NotFound,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DoorActionResponse {
    /// Normalized door identifier (trimmed, uppercase)
    pub door_id: String,
    /// Action that was performed: open, close, leave-open or status
    pub action: String,
    pub outcome: DoorOutcome,
    /// Status reported by the door, usually "opened" or "closed"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Minutes the door was left open (leave-open only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::mcp::schema::optional_uint")]
    pub minutes: Option<u32>,
    pub message: String,
}

impl DoorActionResponse {
    /// Turn a finished task into a response, or an error message for the caller.
    pub fn from_result(
        door_id: &str,
        kind: DoorCommandKind,
        minutes: Option<u32>,
        result: DoorResult,
    ) -> Result<Self, String> {
        let door_id = DoorId::parse(door_id)
            .map(String::from)
            .unwrap_or_else(|_| door_id.trim().to_uppercase());

        match result {
            DoorResult::Status(status) => {
                let message = match (kind, minutes) {
                    (DoorCommandKind::Status, _) => format!("Door {} is {}", door_id, status),
                    (DoorCommandKind::LeaveOpen, Some(m)) => {
                        format!("Door {} left open for {} minute(s): {}", door_id, m, status)
                    }
                    _ => format!("Door {}: {}", door_id, status),
                };
                Ok(Self {
                    door_id,
                    action: kind.to_string(),
                    outcome: DoorOutcome::Done,
                    status: Some(status),
                    minutes,
                    message,
                })
            }
            DoorResult::DoorNotFound => Ok(Self {
                message: format!("Door with ID {} was not found", door_id),
                door_id,
                action: kind.to_string(),
                outcome: DoorOutcome::NotFound,
                status: None,
                minutes,
            }),
            DoorResult::Error(kind) => Err(describe_error(kind)),
        }
    }
}

/// Error text for a tool result: the kind, what to do about it, and the user message.
pub fn describe_error(kind: SshErrorKind) -> String {
    let hint = match kind.category() {
        ErrorCategory::Credentials => "use door_set_credentials",
        ErrorCategory::Network => "check network access to the door host",
        ErrorCategory::General => "try again",
    };
    format!("{} ({}). {}", kind, hint, kind.user_message())
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DoorConnectResponse {
    pub host: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub port: u16,
    pub identity: Option<String>,
    /// Whether an existing session was replaced
    pub forced: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionStatusResponse {
    pub host: String,
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub port: u16,
    pub state: ConnectionState,
    /// Identity of the cached credentials, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// When the current session was established (RFC3339 format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
}

impl From<SessionStatus> for SessionStatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            host: status.host,
            port: status.port,
            state: status.state,
            identity: status.identity,
            connected_at: status.connected_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CredentialsResponse {
    /// Identity now cached, `None` after clearing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Whether the change was written to the credential store
    pub persisted: bool,
    pub message: String,
}
