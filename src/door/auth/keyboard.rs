//! Keyboard-interactive SSH authentication.
//!
//! The remote host asks for the password through keyboard-interactive prompts.
//! Every prompt of every round is answered with the secret.

use async_trait::async_trait;
use russh::client::{self, KeyboardInteractiveAuthResponse};
use tracing::debug;

use crate::door::credentials::Secret;
use crate::door::error::SessionError;
use crate::door::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Servers normally need one or two rounds; stop a misbehaving one.
const MAX_ROUNDS: usize = 5;

pub struct KeyboardInteractiveAuth {
    secret: Secret,
}

impl KeyboardInteractiveAuth {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    fn answers(&self, prompt_count: usize) -> Vec<String> {
        vec![self.secret.expose().to_string(); prompt_count]
    }
}

#[async_trait]
impl AuthStrategy for KeyboardInteractiveAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        let mut response = handle
            .authenticate_keyboard_interactive_start(username, None::<String>)
            .await
            .map_err(|e| SessionError::Auth(format!("keyboard-interactive: {}", e)))?;

        for round in 0..MAX_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(true),
                KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
                KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                    debug!(
                        "Keyboard-interactive round {} with {} prompt(s)",
                        round + 1,
                        prompts.len()
                    );
                    response = handle
                        .authenticate_keyboard_interactive_respond(self.answers(prompts.len()))
                        .await
                        .map_err(|e| {
                            SessionError::Auth(format!("keyboard-interactive: {}", e))
                        })?;
                }
            }
        }

        Ok(false)
    }

    fn name(&self) -> &'static str {
        "keyboard-interactive"
    }
}
