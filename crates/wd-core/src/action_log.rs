//! Action Log wire format.
//!
//! A `.draft` file (and the body stored remotely) is a JSON array of
//! `{ "type", "payload" }` records. Decoding is lenient per record: a record
//! that is not a known action is skipped so one bad entry never discards an
//! otherwise valid session.

use crate::action::Action;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name used for a local export when the session was never saved.
pub const DEFAULT_FILE_NAME: &str = "diagram.draft";

/// Whole-document decode failure.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("action log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("action log must be a JSON array")]
    NotAnArray,
}

/// An ordered sequence of actions; replaying it from an empty state
/// reproduces the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog(pub Vec<Action>);

/// Result of a lenient decode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    pub log: ActionLog,
    /// Records that were dropped because they are not recognised actions.
    pub skipped: usize,
}

impl ActionLog {
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String, LogError> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    /// Decode a JSON array, skipping unrecognised records.
    pub fn from_json(text: &str) -> Result<DecodedLog, LogError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<DecodedLog, LogError> {
        let serde_json::Value::Array(records) = value else {
            return Err(LogError::NotAnArray);
        };

        let mut actions = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for (index, record) in records.into_iter().enumerate() {
            let kind = record
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value::<Action>(record) {
                Ok(action) => actions.push(action),
                Err(err) => {
                    log::warn!("skipping action #{index} ({kind}): {err}");
                    skipped += 1;
                }
            }
        }

        Ok(DecodedLog {
            log: ActionLog(actions),
            skipped,
        })
    }
}

impl From<Vec<Action>> for ActionLog {
    fn from(actions: Vec<Action>) -> Self {
        Self(actions)
    }
}

impl<'a> IntoIterator for &'a ActionLog {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `<token>.draft` for a saved session, `diagram.draft` otherwise.
pub fn file_name(read_token: Option<&str>) -> String {
    match read_token {
        Some(token) if !token.is_empty() => format!("{token}.draft"),
        _ => DEFAULT_FILE_NAME.to_string(),
    }
}
