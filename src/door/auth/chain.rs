//! Authentication chain for trying multiple strategies.

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::door::credentials::Secret;
use crate::door::error::SessionError;
use crate::door::session::SshClientHandler;

use super::traits::AuthStrategy;
use super::{KeyboardInteractiveAuth, PasswordAuth};

/// Tries strategies in the order they were added; the first success wins.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Keyboard-interactive first, then plain password.
    pub fn for_secret(secret: &Secret) -> Self {
        Self::new()
            .with_keyboard_interactive(secret.clone())
            .with_password(secret.clone())
    }

    pub fn with_keyboard_interactive(mut self, secret: Secret) -> Self {
        self.strategies
            .push(Box::new(KeyboardInteractiveAuth::new(secret)));
        self
    }

    pub fn with_password(mut self, secret: Secret) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(secret)));
        self
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[cfg(test)]
    fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    /// Rejections are not errors: a chain whose every strategy was rejected
    /// yields `Ok(false)`. An error is returned only when no strategy produced
    /// a verdict at all.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        let mut rejected = false;
        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authentication succeeded with strategy: {}", strategy.name());
                    return Ok(true);
                }
                Ok(false) => {
                    debug!("Authentication rejected with strategy: {}", strategy.name());
                    rejected = true;
                }
                Err(e) => {
                    debug!(
                        "Authentication error with strategy {}: {}",
                        strategy.name(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !rejected => Err(e),
            _ if self.strategies.is_empty() => Err(SessionError::Auth(
                "No authentication strategies configured".to_string(),
            )),
            _ => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
