//! Remote door control over a single persistent SSH session.
//!
//! This module is organized into the following submodules:
//!
//! - `error`: Error taxonomy reported to callers and transport error classification
//! - `config`: Configuration resolution with environment variable support
//! - `credentials`: Credential model and stores
//! - `auth`: Authentication strategies (keyboard-interactive, password)
//! - `session`: Session and connector traits plus the russh client handler
//! - `client`: russh-backed connector and session
//! - `manager`: The serialized session context (`SessionManager` / `SessionHandle`)
//! - `executor`: Runs one command on a prepared session
//! - `protocol`: Door command encoding and response decoding
//! - `task`: Per-action task with the single-retry policy and leave-open flow
//! - `service`: Façade wiring credentials, the session context and tasks

pub(crate) mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod manager;
pub mod protocol;
pub mod service;
pub mod session;
pub mod task;

#[cfg(test)]
pub(crate) mod mock;

pub use config::DoorConfig;
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use error::{ErrorCategory, SshErrorKind};
pub use manager::{SessionHandle, SessionManager, SessionStatus};
pub use protocol::{DoorCommandKind, DoorId, DoorResult};
pub use service::DoorService;
pub use task::{Dispatch, DoorTask, PendingLeaveOpen, TaskCompletion, TaskError};
