//! Credential model and stores.
//!
//! The session context only ever needs a cached (identity, secret) pair; where
//! that pair is kept between runs is the business of a [`CredentialStore`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Secret that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Secret(secret.into())
    }

    /// Use this only when handing the secret to the transport.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

/// Identity/secret pair used to authenticate against the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: String,
    pub secret: Secret,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: Secret::new(secret),
        }
    }

    /// Both halves must be present for the pair to count.
    pub fn is_complete(&self) -> bool {
        !self.identity.trim().is_empty() && !self.secret.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Credential file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persistent home of the credentials.
///
/// Absence is `Ok(None)`; a record missing either half is reported as absent.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>, StoreError>;

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.clone().filter(Credentials::is_complete))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// JSON file store. The file is created with owner-only permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credentials: Credentials = serde_json::from_str(&raw)?;
        debug!("Loaded credentials from {}", self.path.display());
        Ok(Some(credentials).filter(Credentials::is_complete))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        info!(
            "Saved credentials for {} to {}",
            credentials.identity,
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed credentials file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod secret {
        use super::*;

        #[test]
        fn test_debug_hides_secret() {
            let credentials = Credentials::new("alice", "hunter2");
            let rendered = format!("{:?}", credentials);
            assert!(rendered.contains("alice"));
            assert!(!rendered.contains("hunter2"));
        }

        #[test]
        fn test_incomplete_pairs() {
            assert!(Credentials::new("alice", "pw").is_complete());
            assert!(!Credentials::new("  ", "pw").is_complete());
            assert!(!Credentials::new("alice", "").is_complete());
        }
    }

    mod memory_store {
        use super::*;

        #[test]
        fn test_empty_by_default() {
            let store = MemoryCredentialStore::new();
            assert!(store.load().unwrap().is_none());
        }

        #[test]
        fn test_last_write_wins() {
            let store = MemoryCredentialStore::new();
            store.save(&Credentials::new("alice", "one")).unwrap();
            store.save(&Credentials::new("bob", "two")).unwrap();
            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded.identity, "bob");
            assert_eq!(loaded.secret.expose(), "two");
        }

        #[test]
        fn test_clear() {
            let store = MemoryCredentialStore::with_credentials(Credentials::new("alice", "pw"));
            store.clear().unwrap();
            assert!(store.load().unwrap().is_none());
        }
    }

    mod file_store {
        use super::*;

        #[test]
        fn test_missing_file_is_absent() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("creds.json"));
            assert!(store.load().unwrap().is_none());
        }

        #[test]
        fn test_save_creates_parent_dirs_and_loads_back() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("nested/dir/creds.json"));
            store.save(&Credentials::new("alice", "pw")).unwrap();

            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded, Credentials::new("alice", "pw"));
        }

        #[cfg(unix)]
        #[test]
        fn test_file_is_owner_only() {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("creds.json"));
            store.save(&Credentials::new("alice", "pw")).unwrap();

            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        #[test]
        fn test_clear_is_idempotent() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCredentialStore::new(dir.path().join("creds.json"));
            store.save(&Credentials::new("alice", "pw")).unwrap();
            store.clear().unwrap();
            store.clear().unwrap();
            assert!(store.load().unwrap().is_none());
        }

        #[test]
        fn test_partial_record_is_absent() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("creds.json");
            fs::write(&path, r#"{"identity":"alice","secret":""}"#).unwrap();
            let store = FileCredentialStore::new(path);
            assert!(store.load().unwrap().is_none());
        }

        #[test]
        fn test_malformed_file_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("creds.json");
            fs::write(&path, "not json").unwrap();
            let store = FileCredentialStore::new(path);
            assert!(matches!(store.load(), Err(StoreError::Format(_))));
        }
    }
}
