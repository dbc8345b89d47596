//! Loading slice: persistence tokens, in-flight flag, and the record of
//! recently saved diagrams.

use crate::bridge::SavedTokens;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// When a diagram was last saved, and the token that lets us update it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDiagram {
    /// Milliseconds since the Unix epoch.
    pub date: u64,
    pub token_to_write: String,
}

/// Recently saved diagrams keyed by read token.
pub type RecentDiagrams = BTreeMap<String, RecentDiagram>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub token_to_read: Option<String>,
    pub token_to_write: Option<String>,
    pub is_loading: bool,
    pub recent_diagrams: RecentDiagrams,
}

impl LoadingState {
    pub fn with_recent(recent_diagrams: RecentDiagrams) -> Self {
        Self {
            recent_diagrams,
            ..Self::default()
        }
    }

    /// Both tokens, if this session has been persisted with write access.
    pub fn saved_tokens(&self) -> Option<SavedTokens> {
        match (&self.token_to_read, &self.token_to_write) {
            (Some(read), Some(write)) => Some(SavedTokens {
                read_token: read.clone(),
                write_token: write.clone(),
            }),
            _ => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.token_to_read = None;
        self.token_to_write = None;
        self.is_loading = false;
    }

    pub(crate) fn record_saved(&mut self, tokens: &SavedTokens, date: u64) {
        self.token_to_read = Some(tokens.read_token.clone());
        self.token_to_write = Some(tokens.write_token.clone());
        self.recent_diagrams.insert(
            tokens.read_token.clone(),
            RecentDiagram {
                date,
                token_to_write: tokens.write_token.clone(),
            },
        );
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// ─── Recent store ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RecentStoreError {
    #[error("recent store I/O: {0}")]
    Io(#[from] io::Error),
    #[error("recent store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON file holding [`RecentDiagrams`].
///
/// Writes go to `{path}.tmp`, are synced, then renamed over `path`.
#[derive(Debug, Clone)]
pub struct RecentStore {
    path: PathBuf,
}

impl RecentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }

    /// A missing file is an empty record.
    pub async fn load(&self) -> Result<RecentDiagrams, RecentStoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RecentDiagrams::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn save(&self, recent: &RecentDiagrams) -> Result<(), RecentStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(recent)?;
        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path).await?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&body).await?;
            writer.flush().await?;
            writer.get_ref().sync_all().await?;
        }
        fs::rename(&tmp_path, &self.path).await?;

        log::debug!(
            "saved {} recent diagram(s) to {}",
            recent.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(read: &str, write: &str) -> SavedTokens {
        SavedTokens {
            read_token: read.into(),
            write_token: write.into(),
        }
    }

    #[test]
    fn saved_tokens_need_both() {
        let mut state = LoadingState::default();
        assert_eq!(state.saved_tokens(), None);

        state.token_to_read = Some("r".into());
        assert_eq!(state.saved_tokens(), None);

        state.record_saved(&tokens("r", "w"), 7);
        assert_eq!(state.saved_tokens(), Some(tokens("r", "w")));
        assert_eq!(
            state.recent_diagrams.get("r"),
            Some(&RecentDiagram {
                date: 7,
                token_to_write: "w".into()
            })
        );
    }

    #[test]
    fn reset_keeps_recent_record() {
        let mut state = LoadingState::default();
        state.record_saved(&tokens("r", "w"), 1);
        state.is_loading = true;
        state.reset();
        assert_eq!(state.token_to_read, None);
        assert_eq!(state.token_to_write, None);
        assert!(!state.is_loading);
        assert_eq!(state.recent_diagrams.len(), 1);
    }

    #[tokio::test]
    async fn store_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecentStore::new(dir.path().join("nested").join("recent.json"));
        assert!(store.load().await.unwrap().is_empty());

        let mut recent = RecentDiagrams::new();
        recent.insert(
            "abc".into(),
            RecentDiagram {
                date: 1_700_000_000_000,
                token_to_write: "xyz".into(),
            },
        );
        store.save(&recent).await.unwrap();
        assert_eq!(store.load().await.unwrap(), recent);
        assert!(!store.temp_path().exists());

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"tokenToWrite\": \"xyz\""));
    }

    #[tokio::test]
    async fn corrupt_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RecentStore::new(&path).load().await,
            Err(RecentStoreError::Json(_))
        ));
    }
}
