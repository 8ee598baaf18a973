//! Door command encoding and response decoding.
//!
//! | Kind | Command text |
//! |---|---|
//! | close | `door D 0` |
//! | open | `door D` |
//! | leave-open | `door D <minutes>` |
//! | status | `door -s D` |
//!
//! The remote tool answers with a line ending in `: <status>` on success and
//! with text containing `Error` when it does not know the door.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::SshErrorKind;
use super::task::TaskError;

/// Corridor and lounge doors, the only ones that may stay open longer than the default.
static CORRIDOR_OR_LOUNGE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[AB][1-5]C[EW]").expect("valid door pattern"));

/// Normalized door identifier: trimmed, uppercase, non-empty.
///
/// Only ASCII alphanumerics and `-`, `_`, `.` are accepted since the id is
/// interpolated into a remote shell command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoorId(String);

impl DoorId {
    pub fn parse(raw: &str) -> Result<Self, TaskError> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(TaskError::InvalidDoorId(raw.to_string()));
        }

        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(TaskError::InvalidDoorId(raw.to_string()));
        }

        Ok(DoorId(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the door may be left open for a chosen duration.
    pub fn allows_leave_open(&self) -> bool {
        CORRIDOR_OR_LOUNGE.is_match(&self.0)
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DoorId {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DoorId::parse(&value)
    }
}

impl From<DoorId> for String {
    fn from(id: DoorId) -> Self {
        id.0
    }
}

/// What the user asked the door to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorCommandKind {
    Close,
    Open,
    /// Needs a duration before anything is sent.
    LeaveOpen,
    Status,
}

impl fmt::Display for DoorCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorCommandKind::Close => write!(f, "close"),
            DoorCommandKind::Open => write!(f, "open"),
            DoorCommandKind::LeaveOpen => write!(f, "leave-open"),
            DoorCommandKind::Status => write!(f, "status"),
        }
    }
}

/// Command text for every kind that needs no further input.
///
/// Returns `None` for [`DoorCommandKind::LeaveOpen`], which is built by
/// [`leave_open_command`] once the duration is known.
pub fn encode_command(kind: DoorCommandKind, door: &DoorId) -> Option<String> {
    match kind {
        DoorCommandKind::Close => Some(format!("door {} 0", door)),
        DoorCommandKind::Open => Some(format!("door {}", door)),
        DoorCommandKind::Status => Some(format!("door -s {}", door)),
        DoorCommandKind::LeaveOpen => None,
    }
}

pub fn leave_open_command(door: &DoorId, minutes: u32) -> String {
    format!("door {} {}", door, minutes)
}

/// Outcome of one door task. Exactly one is produced per completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum DoorResult {
    /// Status reported by the remote side, e.g. `opened` or `closed`.
    Status(String),
    /// The remote side does not know the door.
    DoorNotFound,
    Error(SshErrorKind),
}

/// Decoded form of a non-silent response.
///
/// Silence (`None` from the executor) is not decoded here; it drives the
/// retry policy in [`crate::door::task`].
pub fn parse_output(output: &str) -> DoorResult {
    if output.contains("Error") {
        return DoorResult::DoorNotFound;
    }

    let status = match output.rfind(": ") {
        Some(index) => &output[index + 2..],
        None => output,
    };

    DoorResult::Status(status.trim().to_string())
}
