//! Scripted connector and session for tests without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::credentials::Secret;
use super::error::SessionError;
use super::session::{CommandOutput, ConnectionState, Connector, RemoteSession};

/// Scripted answer to the next command.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Output { stdout: String, stderr: String },
    TransportError,
    TimedOut,
    /// Sleep, then answer.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub(crate) fn output(stdout: &str) -> Self {
        Reply::Output {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub(crate) fn stderr(stderr: &str) -> Self {
        Reply::Output {
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub(crate) fn silence() -> Self {
        Reply::output("")
    }
}

#[derive(Debug, Default)]
struct Script {
    refuse_connections: bool,
    /// `None` accepts any secret.
    accepted_secret: Option<String>,
    replies: VecDeque<Reply>,
    connects: usize,
    authentications: usize,
    disconnects: usize,
    commands: Vec<String>,
    live: Vec<Arc<AtomicBool>>,
}

fn lock(script: &Mutex<Script>) -> std::sync::MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(|e| e.into_inner())
}

/// Connector whose sessions share one script and one journal.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnector {
    script: Arc<Mutex<Script>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn refuse_connections(self) -> Self {
        lock(&self.script).refuse_connections = true;
        self
    }

    pub(crate) fn accept_only(self, secret: &str) -> Self {
        lock(&self.script).accepted_secret = Some(secret.to_string());
        self
    }

    pub(crate) fn with_replies(self, replies: Vec<Reply>) -> Self {
        lock(&self.script).replies.extend(replies);
        self
    }

    pub(crate) fn set_refuse_connections(&self, refuse: bool) {
        lock(&self.script).refuse_connections = refuse;
    }

    /// Simulates the remote side dropping every open session.
    pub(crate) fn drop_connections(&self) {
        for live in &lock(&self.script).live {
            live.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn connects(&self) -> usize {
        lock(&self.script).connects
    }

    pub(crate) fn authentications(&self) -> usize {
        lock(&self.script).authentications
    }

    pub(crate) fn disconnects(&self) -> usize {
        lock(&self.script).disconnects
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        lock(&self.script).commands.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _host: &str,
        _port: u16,
        identity: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let mut script = lock(&self.script);
        script.connects += 1;
        if script.refuse_connections {
            return Err(SessionError::Connect("Connection refused".to_string()));
        }

        let live = Arc::new(AtomicBool::new(true));
        script.live.push(live.clone());

        Ok(Box::new(MockSession {
            identity: identity.to_string(),
            authenticated: false,
            live,
            script: self.script.clone(),
        }))
    }
}

/// Session driven by a [`Script`].
#[derive(Debug)]
pub(crate) struct MockSession {
    identity: String,
    authenticated: bool,
    live: Arc<AtomicBool>,
    script: Arc<Mutex<Script>>,
}

impl MockSession {
    /// Stand-alone authenticated session answering with `replies`.
    pub(crate) fn authenticated(identity: &str, replies: Vec<Reply>) -> Self {
        let script = Script {
            replies: replies.into(),
            ..Script::default()
        };
        Self {
            identity: identity.to_string(),
            authenticated: true,
            live: Arc::new(AtomicBool::new(true)),
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        lock(&self.script).commands.clone()
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn state(&self) -> ConnectionState {
        if !self.live.load(Ordering::SeqCst) {
            ConnectionState::Disconnected
        } else if self.authenticated {
            ConnectionState::Authenticated
        } else {
            ConnectionState::Connected
        }
    }

    async fn authenticate(&mut self, secret: &Secret) -> Result<bool, SessionError> {
        let mut script = lock(&self.script);
        script.authentications += 1;
        self.authenticated = match &script.accepted_secret {
            Some(accepted) => accepted == secret.expose(),
            None => true,
        };
        Ok(self.authenticated)
    }

    async fn exec(
        &mut self,
        command: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput, SessionError> {
        let reply = {
            let mut script = lock(&self.script);
            script.commands.push(command.to_string());
            script.replies.pop_front().unwrap_or_else(Reply::silence)
        };

        let mut reply = reply;
        while let Reply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }

        match reply {
            Reply::Output { stdout, stderr } => Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: Some(0),
                timed_out: false,
            }),
            Reply::TransportError => Err(SessionError::Channel("channel closed".to_string())),
            Reply::TimedOut => Ok(CommandOutput {
                timed_out: true,
                ..CommandOutput::default()
            }),
            Reply::Delayed(..) => unreachable!("delays are unwrapped above"),
        }
    }

    async fn disconnect(&mut self) {
        lock(&self.script).disconnects += 1;
        self.authenticated = false;
        self.live.store(false, Ordering::SeqCst);
    }
}
