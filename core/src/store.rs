use anyhow::{Context, Result};
use directories::ProjectDirs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Durable key under which the credential is persisted.
pub const CREDENTIAL_KEY: &str = "access_token";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssuedVia {
    #[default]
    Refresh,
    Login,
}

/// The current access credential. The token is opaque; an empty token means
/// "not signed in".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub issued_via: IssuedVia,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, issued_via: IssuedVia) -> Self {
        Self {
            access_token: access_token.into(),
            issued_via,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }
}

/// Key-value persistence backing the token store.
pub trait CredentialStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key under a root directory.
#[derive(Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self { root })
    }

    /// Storage in the platform data directory for the client.
    pub fn in_data_dir() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "jobboard")
            .context("no home directory available for credential storage")?;
        Self::new(dirs.data_dir().to_path_buf())
    }

    pub fn temporary() -> Result<Self> {
        let mut path = std::env::temp_dir();
        path.push(format!("jobboard-{}", Uuid::new_v4()));
        Self::new(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read stored {key}")),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path_for(key), value)
            .with_context(|| format!("failed to persist {key}"))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                Err(err).with_context(|| format!("failed to remove stored {key}"))
            }
            _ => Ok(()),
        }
    }
}

/// Process-local storage. Clones share the same map, which lets tests
/// simulate a restart by building a second store over it.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Holds the single access credential and mirrors it to durable storage.
#[derive(Clone)]
pub struct TokenStore {
    current: Arc<watch::Sender<Credential>>,
    storage: Arc<dyn CredentialStorage>,
}

impl TokenStore {
    /// Builds the store and restores the persisted credential, if any.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let restored = restore(storage.as_ref());
        let (current, _) = watch::channel(restored);
        Self {
            current: Arc::new(current),
            storage,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn get(&self) -> Credential {
        self.current.borrow().clone()
    }

    pub fn set_credential(&self, access_token: impl Into<String>, issued_via: IssuedVia) {
        let credential = Credential::new(access_token, issued_via);
        match serde_json::to_string(&credential) {
            Ok(serialized) => {
                if let Err(err) = self.storage.save(CREDENTIAL_KEY, &serialized) {
                    tracing::warn!(error = ?err, "failed to persist credential");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize credential"),
        }
        tracing::debug!(issued_via = ?credential.issued_via, "credential updated");
        self.current.send_replace(credential);
    }

    pub fn clear(&self) {
        if let Err(err) = self.storage.remove(CREDENTIAL_KEY) {
            tracing::warn!(error = ?err, "failed to remove persisted credential");
        }
        tracing::debug!("credential cleared");
        self.current.send_replace(Credential::default());
    }

    /// Change notifications; the receiver sees every later set or clear.
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.current.subscribe()
    }
}

fn restore(storage: &dyn CredentialStorage) -> Credential {
    let stored = match storage.load(CREDENTIAL_KEY) {
        Ok(stored) => stored,
        Err(err) => {
            tracing::warn!(error = ?err, "failed to load persisted credential");
            None
        }
    };
    stored
        .and_then(|raw| match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(err) => {
                tracing::warn!(%err, "ignoring unreadable persisted credential");
                None
            }
        })
        .unwrap_or_default()
}
