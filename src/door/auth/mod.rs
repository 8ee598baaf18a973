//! Authentication strategies for the door session.
//!
//! # Available Strategies
//!
//! - [`KeyboardInteractiveAuth`]: answers every prompt with the secret
//! - [`PasswordAuth`]: plain password authentication
//!
//! [`AuthChain`] tries strategies in order and stops at the first success.
//!
//! ```ignore
//! let chain = AuthChain::for_secret(&credentials.secret);
//! let authorized = chain.authenticate(&mut handle, "username").await?;
//! ```

mod chain;
mod keyboard;
mod password;
mod traits;

pub use chain::AuthChain;
pub use keyboard::KeyboardInteractiveAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;
