//! Error taxonomy for door commands and transport error classification.
//!
//! Two layers of errors live here:
//!
//! 1. [`SshErrorKind`] is what a caller sees. Each kind belongs to the phase in
//!    which it can occur (before connection, during connection, after connection,
//!    during execution) and maps to an [`ErrorCategory`] so a front end can decide
//!    between prompting for credentials, showing network troubleshooting, or
//!    reporting a generic failure.
//!
//! 2. [`SessionError`] is what the transport layer produces. The session context
//!    folds it into an [`SshErrorKind`] depending on the phase it happened in.
//!
//! # Connect retry classification
//!
//! [`is_retryable_error`] decides whether a failed transport open is worth another
//! attempt. Authentication failures are never retried, connection-level failures
//! are, and anything mentioning the SSH protocol without a connect/timeout hint
//! is treated as permanent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported for a door command, ordered by the phase it can occur in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SshErrorKind {
    /// No credentials are cached; nothing was sent over the network.
    #[error("credentials not found")]
    CredentialsNotFound,
    /// The transport to the remote host could not be opened.
    #[error("connection failed")]
    ConnectionFailed,
    /// The remote host rejected the identity/secret pair.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The command was sent but produced no interpretable response after one retry.
    #[error("execution failed")]
    ExecutionFailed,
}

/// How a front end should react to an [`SshErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Ask the user for a new identity/secret pair.
    Credentials,
    /// Suggest checking network connectivity.
    Network,
    /// Anything else.
    General,
}

impl SshErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            SshErrorKind::CredentialsNotFound | SshErrorKind::AuthenticationFailed => {
                ErrorCategory::Credentials
            }
            SshErrorKind::ConnectionFailed => ErrorCategory::Network,
            SshErrorKind::ExecutionFailed => ErrorCategory::General,
        }
    }

    /// Credential problems need new credentials, not a resend.
    pub fn is_credential_problem(self) -> bool {
        self.category() == ErrorCategory::Credentials
    }

    pub fn is_transport_problem(self) -> bool {
        matches!(
            self,
            SshErrorKind::ConnectionFailed | SshErrorKind::ExecutionFailed
        )
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(self) -> &'static str {
        match self {
            SshErrorKind::CredentialsNotFound => {
                "No credentials are stored. Enter your username and password to continue."
            }
            SshErrorKind::ConnectionFailed => {
                "Make sure that you are connected to a network with access to the public servers."
            }
            SshErrorKind::AuthenticationFailed => {
                "The username or password was rejected. Enter your credentials again."
            }
            SshErrorKind::ExecutionFailed => "Something went wrong while executing the command.",
        }
    }
}

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Connection timed out after {0}s")]
    Timeout(u64),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Session is not connected")]
    Closed,
}

impl From<russh::Error> for SessionError {
    fn from(e: russh::Error) -> Self {
        SessionError::Channel(e.to_string())
    }
}

/// Patterns that mark a failure as permanent.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "authentication error",
    "permission denied",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Patterns that mark a failure as transient.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "timed out",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "handshake failed",
    "failed to connect",
    "broken pipe",
];

/// Returns `true` when a failed connect attempt may succeed if repeated.
///
/// Authentication patterns are checked first and take precedence over
/// connection patterns.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|p| error_lower.contains(p)) {
        return false;
    }

    if RETRYABLE_ERRORS.iter().any(|p| error_lower.contains(p)) {
        return true;
    }

    // SSH protocol errors are permanent unless they hint at connectivity
    !error_lower.contains("ssh") || error_lower.contains("connect")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_kind {
        use super::*;

        #[test]
        fn test_kinds_are_ordered_by_phase() {
            assert!(SshErrorKind::CredentialsNotFound < SshErrorKind::ConnectionFailed);
            assert!(SshErrorKind::ConnectionFailed < SshErrorKind::AuthenticationFailed);
            assert!(SshErrorKind::AuthenticationFailed < SshErrorKind::ExecutionFailed);
        }

        #[test]
        fn test_credential_kinds_prompt_for_credentials() {
            assert_eq!(
                SshErrorKind::CredentialsNotFound.category(),
                ErrorCategory::Credentials
            );
            assert_eq!(
                SshErrorKind::AuthenticationFailed.category(),
                ErrorCategory::Credentials
            );
            assert!(SshErrorKind::AuthenticationFailed.is_credential_problem());
            assert!(!SshErrorKind::AuthenticationFailed.is_transport_problem());
        }

        #[test]
        fn test_transport_kinds() {
            assert_eq!(
                SshErrorKind::ConnectionFailed.category(),
                ErrorCategory::Network
            );
            assert_eq!(
                SshErrorKind::ExecutionFailed.category(),
                ErrorCategory::General
            );
            assert!(SshErrorKind::ConnectionFailed.is_transport_problem());
            assert!(SshErrorKind::ExecutionFailed.is_transport_problem());
            assert!(!SshErrorKind::ExecutionFailed.is_credential_problem());
        }

        #[test]
        fn test_user_messages_are_distinct() {
            let kinds = [
                SshErrorKind::CredentialsNotFound,
                SshErrorKind::ConnectionFailed,
                SshErrorKind::AuthenticationFailed,
                SshErrorKind::ExecutionFailed,
            ];
            for (i, a) in kinds.iter().enumerate() {
                for b in &kinds[i + 1..] {
                    assert_ne!(a.user_message(), b.user_message());
                }
            }
        }

        #[test]
        fn test_serializes_snake_case() {
            let json = serde_json::to_string(&SshErrorKind::CredentialsNotFound)
                .expect("serialize kind");
            assert_eq!(json, "\"credentials_not_found\"");
        }
    }

    mod retry_classification {
        use super::*;

        #[test]
        fn test_auth_errors_not_retryable() {
            assert!(!is_retryable_error("Authentication failed"));
            assert!(!is_retryable_error("PERMISSION DENIED"));
            assert!(!is_retryable_error("Authentication error: rejected"));
        }

        #[test]
        fn test_connection_errors_retryable() {
            assert!(is_retryable_error("Connection refused"));
            assert!(is_retryable_error("Failed to connect: no route to host"));
            assert!(is_retryable_error("Connection timed out after 30s"));
        }

        #[test]
        fn test_auth_takes_precedence() {
            assert!(!is_retryable_error(
                "Connection timeout during authentication failed"
            ));
        }

        #[test]
        fn test_ssh_protocol_error_not_retryable() {
            assert!(!is_retryable_error("SSH version mismatch"));
            assert!(is_retryable_error("SSH failed to connect"));
        }

        #[test]
        fn test_unknown_error_retryable() {
            assert!(is_retryable_error("Something went wrong"));
        }

        #[test]
        fn test_session_error_messages_classify() {
            assert!(is_retryable_error(&SessionError::Timeout(30).to_string()));
            assert!(is_retryable_error(
                &SessionError::Connect("Connection refused".into()).to_string()
            ));
            assert!(!is_retryable_error(
                &SessionError::Auth("rejected".into()).to_string()
            ));
        }
    }
}
