//! Persistence Bridge: reading and writing Action Logs by token.
//!
//! A persisted session is addressed by two opaque tokens. The read token is
//! shareable; the write token authorises updates in place. Writing without
//! tokens creates a new persisted session and mints both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;
use wd_core::{ActionLog, LogError};

/// Tokens identifying a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTokens {
    pub read_token: String,
    pub write_token: String,
}

impl SavedTokens {
    /// Mint a fresh, unguessable token pair.
    pub fn mint() -> Self {
        Self {
            read_token: Uuid::new_v4().to_string(),
            write_token: Uuid::new_v4().to_string(),
        }
    }
}

/// The two failure categories users get to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    FailedToLoad,
    FailedToSave,
}

impl FailureCategory {
    pub fn message(self) -> &'static str {
        match self {
            FailureCategory::FailedToLoad => "Failed to load diagram.",
            FailureCategory::FailedToSave => "Failed to save diagram.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no diagram stored under `{0}`")]
    NotFound(String),
    #[error("write token rejected for `{0}`")]
    Unauthorized(String),
    #[error("storage error: {0}")]
    Io(#[from] io::Error),
    #[error("stored log is unreadable: {0}")]
    Decode(#[from] LogError),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// External store for Action Logs.
///
/// Implementations own their transport; callers only see the two outcomes
/// per operation.
pub trait PersistenceBridge: Send + Sync {
    /// Fetch the log stored under `read_token`.
    fn read(&self, read_token: &str) -> impl Future<Output = Result<ActionLog, BridgeError>> + Send;

    /// Store `log`. With `tokens` the session is updated in place; without,
    /// a new session is created and its freshly minted tokens returned.
    fn write(
        &self,
        tokens: Option<&SavedTokens>,
        log: &ActionLog,
    ) -> impl Future<Output = Result<SavedTokens, BridgeError>> + Send;
}

// ─── In-memory bridge ───────────────────────────────────────────────────

struct StoredLog {
    write_token: String,
    log: ActionLog,
}

/// In-process bridge backed by a map.
///
/// `set_offline(true)` makes every call fail with [`BridgeError::Unavailable`].
#[derive(Default)]
pub struct MemoryBridge {
    logs: Mutex<HashMap<String, StoredLog>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), BridgeError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::Unavailable("bridge is offline".into()));
        }
        Ok(())
    }
}

impl PersistenceBridge for MemoryBridge {
    async fn read(&self, read_token: &str) -> Result<ActionLog, BridgeError> {
        self.check_online()?;
        let logs = self.logs.lock().await;
        logs.get(read_token)
            .map(|stored| stored.log.clone())
            .ok_or_else(|| BridgeError::NotFound(read_token.to_string()))
    }

    async fn write(
        &self,
        tokens: Option<&SavedTokens>,
        log: &ActionLog,
    ) -> Result<SavedTokens, BridgeError> {
        self.check_online()?;
        let mut logs = self.logs.lock().await;
        let tokens = match tokens {
            Some(tokens) => {
                let stored = logs
                    .get_mut(&tokens.read_token)
                    .ok_or_else(|| BridgeError::NotFound(tokens.read_token.clone()))?;
                if stored.write_token != tokens.write_token {
                    return Err(BridgeError::Unauthorized(tokens.read_token.clone()));
                }
                stored.log = log.clone();
                tokens.clone()
            }
            None => {
                let minted = SavedTokens::mint();
                logs.insert(
                    minted.read_token.clone(),
                    StoredLog {
                        write_token: minted.write_token.clone(),
                        log: log.clone(),
                    },
                );
                minted
            }
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(tokens)
    }
}

// ─── File bridge ────────────────────────────────────────────────────────

/// Directory-backed bridge: `<read>.draft` holds the log, `<read>.key` the
/// write token. Files are replaced atomically via write-to-temp-then-rename.
#[derive(Debug, Clone)]
pub struct FileBridge {
    root: PathBuf,
}

impl FileBridge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open `root`, creating it if needed.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, BridgeError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn draft_path(&self, read_token: &str) -> Result<PathBuf, BridgeError> {
        Ok(self.root.join(format!("{}.draft", checked(read_token)?)))
    }

    fn key_path(&self, read_token: &str) -> Result<PathBuf, BridgeError> {
        Ok(self.root.join(format!("{}.key", checked(read_token)?)))
    }

    /// Store a new session. The draft lands before its key, and a failed key
    /// write removes the draft again, so a key never exists without a draft.
    async fn store_new(&self, tokens: &SavedTokens, body: &str) -> Result<(), BridgeError> {
        let draft_path = self.draft_path(&tokens.read_token)?;
        let key_path = self.key_path(&tokens.read_token)?;
        write_atomic(&draft_path, body).await?;
        if let Err(e) = write_atomic(&key_path, &tokens.write_token).await {
            if let Err(cleanup) = tokio::fs::remove_file(&draft_path).await {
                log::warn!("could not remove {}: {cleanup}", draft_path.display());
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Tokens become file names; refuse anything that could escape the root.
fn checked(token: &str) -> Result<&str, BridgeError> {
    let valid = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(token)
    } else {
        Err(BridgeError::NotFound(token.to_string()))
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<String>, BridgeError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

impl PersistenceBridge for FileBridge {
    async fn read(&self, read_token: &str) -> Result<ActionLog, BridgeError> {
        let path = self.draft_path(read_token)?;
        let text = read_if_exists(&path)
            .await?
            .ok_or_else(|| BridgeError::NotFound(read_token.to_string()))?;
        let decoded = ActionLog::from_json(&text)?;
        if decoded.skipped > 0 {
            log::warn!(
                "{}: skipped {} unreadable record(s)",
                path.display(),
                decoded.skipped
            );
        }
        Ok(decoded.log)
    }

    async fn write(
        &self,
        tokens: Option<&SavedTokens>,
        log: &ActionLog,
    ) -> Result<SavedTokens, BridgeError> {
        let body = log.to_json()?;
        let tokens = match tokens {
            Some(tokens) => {
                let key_path = self.key_path(&tokens.read_token)?;
                let stored_key = read_if_exists(&key_path)
                    .await?
                    .ok_or_else(|| BridgeError::NotFound(tokens.read_token.clone()))?;
                if stored_key.trim() != tokens.write_token {
                    return Err(BridgeError::Unauthorized(tokens.read_token.clone()));
                }
                write_atomic(&self.draft_path(&tokens.read_token)?, &body).await?;
                tokens.clone()
            }
            None => {
                let minted = SavedTokens::mint();
                self.store_new(&minted, &body).await?;
                minted
            }
        };
        log::debug!("stored {} action(s) under {}", log.len(), tokens.read_token);
        Ok(tokens)
    }
}
