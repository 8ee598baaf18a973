//! Configuration resolution for the door client.
//!
//! Every value follows a three-tier priority:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DOOR_SSH_HOST` | `pond.cs.huji.ac.il` | Remote host running the `door` command |
//! | `DOOR_SSH_PORT` | 22 | SSH port |
//! | `DOOR_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `DOOR_COMMAND_TIMEOUT` | 60s | Command execution timeout in seconds |
//! | `DOOR_CONNECT_RETRIES` | 0 | Extra attempts for transient connect failures |
//! | `DOOR_RETRY_DELAY_MS` | 1000ms | Initial connect retry delay in milliseconds |
//! | `DOOR_RETRY_RECONNECT` | false | Force a reconnect before resending after silence |
//! | `DOOR_CREDENTIALS_FILE` | `<config dir>/ssh-door/credentials.json` | Credential file |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Host serving the `door` command.
pub const DEFAULT_HOST: &str = "pond.cs.huji.ac.il";

pub const DEFAULT_PORT: u16 = 22;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_CONNECT_RETRIES: u32 = 0;

pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Upper bound for the exponential connect backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const HOST_ENV_VAR: &str = "DOOR_SSH_HOST";
pub(crate) const PORT_ENV_VAR: &str = "DOOR_SSH_PORT";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "DOOR_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "DOOR_COMMAND_TIMEOUT";
pub(crate) const CONNECT_RETRIES_ENV_VAR: &str = "DOOR_CONNECT_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "DOOR_RETRY_DELAY_MS";
pub(crate) const RETRY_RECONNECT_ENV_VAR: &str = "DOOR_RETRY_RECONNECT";
pub(crate) const CREDENTIALS_FILE_ENV_VAR: &str = "DOOR_CREDENTIALS_FILE";

/// Fully resolved settings for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct DoorConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub connect_retries: u32,
    pub retry_delay: Duration,
    /// Force a reconnect before the single resend that follows a silent output.
    pub retry_reconnect: bool,
    pub credentials_file: PathBuf,
}

impl DoorConfig {
    /// Resolve every setting from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: resolve_host(None),
            port: resolve_port(None),
            connect_timeout: Duration::from_secs(resolve_connect_timeout(None)),
            command_timeout: Duration::from_secs(resolve_command_timeout(None)),
            connect_retries: resolve_connect_retries(None),
            retry_delay: Duration::from_millis(resolve_retry_delay_ms(None)),
            retry_reconnect: resolve_retry_reconnect(None),
            credentials_file: resolve_credentials_file(None),
        }
    }
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            connect_retries: DEFAULT_CONNECT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retry_reconnect: false,
            credentials_file: default_credentials_file(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

pub(crate) fn resolve_host(host_param: Option<String>) -> String {
    if let Some(host) = host_param {
        return host;
    }

    if let Ok(host) = env::var(HOST_ENV_VAR)
        && !host.trim().is_empty()
    {
        return host.trim().to_string();
    }

    DEFAULT_HOST.to_string()
}

pub(crate) fn resolve_port(port_param: Option<u16>) -> u16 {
    port_param
        .or_else(|| env_parse(PORT_ENV_VAR))
        .unwrap_or(DEFAULT_PORT)
}

pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(CONNECT_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}

pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(COMMAND_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS)
}

pub(crate) fn resolve_connect_retries(retries_param: Option<u32>) -> u32 {
    retries_param
        .or_else(|| env_parse(CONNECT_RETRIES_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_RETRIES)
}

pub(crate) fn resolve_retry_delay_ms(delay_param: Option<u64>) -> u64 {
    delay_param
        .or_else(|| env_parse(RETRY_DELAY_MS_ENV_VAR))
        .unwrap_or(DEFAULT_RETRY_DELAY_MS)
}

pub(crate) fn resolve_retry_reconnect(reconnect_param: Option<bool>) -> bool {
    reconnect_param
        .or_else(|| env_flag(RETRY_RECONNECT_ENV_VAR))
        .unwrap_or(false)
}

pub(crate) fn resolve_credentials_file(path_param: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path_param {
        return path;
    }

    if let Ok(path) = env::var(CREDENTIALS_FILE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    default_credentials_file()
}

fn default_credentials_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ssh-door")
        .join("credentials.json")
}
