//! Runs one opaque command on an already prepared session.
//!
//! The executor does not own the session; it is always invoked from inside the
//! session context so commands never overlap with each other or with a
//! connect/authenticate/disconnect.
//!
//! `None` means "no interpretable output" and is what the protocol layer treats
//! as its retryable silence signal. Transport errors, timeouts and an empty
//! combined output all collapse into it.

use std::time::Duration;

use tracing::{debug, warn};

use super::session::RemoteSession;

#[derive(Debug, Clone, Copy)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns stdout followed by stderr, or `None` on silence.
    pub async fn run(&self, session: &mut dyn RemoteSession, command: &str) -> Option<String> {
        let output = match session.exec(command, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Command '{}' failed on the transport: {}", command, e);
                return None;
            }
        };

        if output.timed_out {
            warn!("Command '{}' timed out after {:?}", command, self.timeout);
            return None;
        }

        let mut combined = output.stdout;
        combined.push_str(&output.stderr);

        if combined.trim().is_empty() {
            debug!("Command '{}' produced no output", command);
            return None;
        }

        Some(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::door::mock::{MockSession, Reply};

    fn executor() -> CommandExecutor {
        CommandExecutor::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_returns_stdout() {
        let mut session = MockSession::authenticated("alice", vec![Reply::output("A1CE: closed\n")]);
        let output = executor().run(&mut session, "door -s A1CE").await;
        assert_eq!(output.as_deref(), Some("A1CE: closed\n"));
        assert_eq!(session.sent(), vec!["door -s A1CE".to_string()]);
    }

    #[tokio::test]
    async fn test_appends_stderr() {
        let mut session =
            MockSession::authenticated("alice", vec![Reply::stderr("Error: door not found")]);
        let output = executor().run(&mut session, "door ZZZ").await;
        assert_eq!(output.as_deref(), Some("Error: door not found"));
    }

    #[tokio::test]
    async fn test_transport_error_is_silence() {
        let mut session = MockSession::authenticated("alice", vec![Reply::TransportError]);
        assert!(executor().run(&mut session, "door A1CE").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_silence() {
        let mut session = MockSession::authenticated("alice", vec![Reply::TimedOut]);
        assert!(executor().run(&mut session, "door A1CE").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_output_is_silence() {
        let mut session = MockSession::authenticated("alice", vec![Reply::output("  \n")]);
        assert!(executor().run(&mut session, "door A1CE").await.is_none());
    }
}
