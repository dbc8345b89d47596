//! Session Bootstrapper: owns the undoable editor and the loading slice, and
//! reconciles "start fresh", "load by replay" and "load failed" into one
//! well-formed state.
//!
//! Bridge calls are split into `begin_*` / `finish_*` so the caller decides
//! how the future is driven. Each `begin_*` hands out a ticket; results for a
//! ticket that a newer request has superseded are discarded.
//!
//! Every lifecycle method returns [`Effects`]: the notifications, route
//! changes, and recent-record writes the embedding application performs.

use crate::bridge::{BridgeError, FailureCategory, PersistenceBridge, SavedTokens};
use crate::config::SessionConfig;
use crate::history::UndoableState;
use crate::loading::{LoadingState, RecentDiagrams, now_millis};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use wd_core::action_log::file_name;
use wd_core::{Action, ActionLog, EditorState, LogError};

pub type EditorHistory = UndoableState<EditorState, Action>;

pub type Effects = SmallVec<[SessionEffect; 3]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Info(String),
    Error(String),
}

/// Requests to collaborators outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Toast(Toast),
    /// Route to a read token, or to the root for `None`.
    Navigate(Option<String>),
    /// The recent-diagrams record changed and should be stored.
    PersistRecent(RecentDiagrams),
}

/// A `.draft` file ready to hand to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExport {
    pub file_name: String,
    pub contents: String,
}

/// An outstanding load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    token_to_read: String,
    token_to_write: Option<String>,
    navigate: bool,
}

impl LoadTicket {
    pub fn token_to_read(&self) -> &str {
        &self.token_to_read
    }
}

/// An outstanding save, carrying the log captured when it began.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    generation: u64,
    tokens: Option<SavedTokens>,
    log: ActionLog,
    navigate: bool,
}

impl SaveTicket {
    /// `None` when the save creates a new persisted session.
    pub fn tokens(&self) -> Option<&SavedTokens> {
        self.tokens.as_ref()
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }
}

// ─── Replay ─────────────────────────────────────────────────────────────

/// A fresh single-diagram history.
pub fn new_history() -> EditorHistory {
    let initial_action = Action::add_diagram();
    let initial = wd_core::reduce(&Arc::new(EditorState::empty()), &initial_action);
    EditorHistory::create(initial, initial_action)
}

/// Rebuild a history from a persisted log.
///
/// The log is folded into a single running snapshot; actions that change
/// nothing are dropped. The result is then validated as a whole; anything
/// unusable yields a fresh session instead. The returned history has no undo
/// entries.
pub fn replay(log: &ActionLog) -> EditorHistory {
    let Some((first, rest)) = log.actions().split_first() else {
        return new_history();
    };

    let mut actions = vec![first.clone()];
    let mut present = wd_core::fold([first]);
    for action in rest {
        fold_into(&mut actions, &mut present, action);
    }

    let Some(first_diagram) = present.first_diagram_id() else {
        log::warn!("replayed log has no diagram, starting fresh");
        return new_history();
    };
    if present.selected_diagram().is_none() {
        log::warn!("replayed log has no selected diagram, selecting {first_diagram}");
        let select = Action::SelectDiagram {
            diagram_id: first_diagram,
        };
        fold_into(&mut actions, &mut present, &select);
    }
    if let Err(violation) = present.check_invariants() {
        log::warn!("replayed state is inconsistent ({violation}), starting fresh");
        return new_history();
    }

    if let Some(selected) = present.selected_diagram_id {
        let clear = Action::select_items(selected, std::iter::empty());
        fold_into(&mut actions, &mut present, &clear);
    }
    log::debug!("replayed {} of {} action(s)", actions.len(), log.len());
    EditorHistory::from_replayed(actions, present)
}

/// Apply `action` to `present`, keeping it in `actions` only if it changed
/// something.
fn fold_into(actions: &mut Vec<Action>, present: &mut Arc<EditorState>, action: &Action) {
    let next = wd_core::reduce(present, action);
    if !Arc::ptr_eq(&next, present) {
        *present = next;
        actions.push(action.clone());
    }
}

// ─── Session ────────────────────────────────────────────────────────────

/// One editing session.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    editor: EditorHistory,
    loading: LoadingState,
    /// Bumped whenever a new session or load supersedes outstanding work.
    generation: u64,
    pending_load: Option<String>,
    saving: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_recent(config, RecentDiagrams::new())
    }

    /// A new session that starts with a previously stored recent record.
    pub fn with_recent(config: SessionConfig, recent: RecentDiagrams) -> Self {
        let editor = new_history().with_max_depth(config.max_history);
        Self {
            config,
            editor,
            loading: LoadingState::with_recent(recent),
            generation: 0,
            pending_load: None,
            saving: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn editor(&self) -> &EditorHistory {
        &self.editor
    }

    pub fn present(&self) -> &Arc<EditorState> {
        self.editor.present()
    }

    pub fn loading(&self) -> &LoadingState {
        &self.loading
    }

    /// The log that replays to the present state.
    pub fn action_log(&self) -> ActionLog {
        self.editor.actions().cloned().collect::<Vec<_>>().into()
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    pub fn dispatch(&mut self, action: Action) -> bool {
        self.editor.commit(action)
    }

    pub fn undo(&mut self) -> bool {
        self.editor.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.editor.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.editor.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.editor.can_redo()
    }

    /// Select every root-level entity of the selected diagram.
    pub fn select_all(&mut self) -> bool {
        let Some(diagram) = self.editor.present().selected_diagram() else {
            return false;
        };
        let action = Action::select_items(diagram.id, diagram.root_ids.iter().copied());
        self.editor.commit(action)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Discard everything and start a fresh single-diagram session.
    pub fn new_diagram(&mut self, navigate: bool) -> Effects {
        log::info!("starting new session");
        self.supersede();
        self.reset();

        let mut effects = Effects::new();
        if navigate {
            effects.push(SessionEffect::Navigate(None));
        }
        effects
    }

    /// Start loading `token_to_read`.
    ///
    /// Returns `None` for an empty token or one that is already loaded or
    /// loading.
    pub fn begin_load(
        &mut self,
        token_to_read: &str,
        token_to_write: Option<&str>,
        navigate: bool,
    ) -> Option<LoadTicket> {
        if token_to_read.is_empty()
            || self.loading.token_to_read.as_deref() == Some(token_to_read)
            || self.pending_load.as_deref() == Some(token_to_read)
        {
            log::debug!("ignoring load of {token_to_read:?}");
            return None;
        }

        self.supersede();
        self.pending_load = Some(token_to_read.to_string());
        self.sync_busy();
        log::info!("loading {token_to_read}");

        Some(LoadTicket {
            generation: self.generation,
            token_to_read: token_to_read.to_string(),
            token_to_write: token_to_write.map(str::to_string),
            navigate,
        })
    }

    /// Apply the outcome of a load. Superseded tickets change nothing.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ActionLog, BridgeError>,
    ) -> Effects {
        if ticket.generation != self.generation {
            log::debug!("discarding superseded load of {}", ticket.token_to_read);
            return Effects::new();
        }
        self.pending_load = None;

        match result {
            Ok(log) => {
                self.editor = replay(&log).with_max_depth(self.config.max_history);
                self.loading.token_to_read = Some(ticket.token_to_read.clone());
                self.loading.token_to_write = ticket.token_to_write;
                self.sync_busy();
                log::info!("loaded {} ({} actions)", ticket.token_to_read, log.len());

                let mut effects = Effects::new();
                if ticket.navigate {
                    effects.push(SessionEffect::Navigate(Some(ticket.token_to_read)));
                }
                effects.push(info("Successfully loaded diagram."));
                effects
            }
            Err(err) => {
                log::warn!("failed to load {}: {err}", ticket.token_to_read);
                self.reset();
                smallvec![error(FailureCategory::FailedToLoad)]
            }
        }
    }

    /// Start saving the current log. Returns `None` while a save or a load
    /// is outstanding.
    pub fn begin_save(&mut self, navigate: bool) -> Option<SaveTicket> {
        if self.saving || self.pending_load.is_some() {
            log::debug!("save refused: request in flight");
            return None;
        }
        self.saving = true;
        self.sync_busy();

        Some(SaveTicket {
            generation: self.generation,
            tokens: self.loading.saved_tokens(),
            log: self.action_log(),
            navigate,
        })
    }

    /// Apply the outcome of a save. The editor is never touched; a failure
    /// only produces a notification.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<SavedTokens, BridgeError>,
    ) -> Effects {
        if ticket.generation != self.generation {
            log::debug!("discarding save for a superseded session");
            return Effects::new();
        }
        self.saving = false;
        self.sync_busy();

        match result {
            Ok(tokens) => {
                self.loading.record_saved(&tokens, now_millis());
                log::info!("saved {} action(s) as {}", ticket.log.len(), tokens.read_token);

                let message = if ticket.tokens.is_none() {
                    format!("Diagram saved under {}.", self.config.share_url(&tokens.read_token))
                } else {
                    "Diagram saved.".to_string()
                };

                let mut effects = Effects::new();
                if ticket.navigate {
                    effects.push(SessionEffect::Navigate(Some(tokens.read_token)));
                }
                effects.push(SessionEffect::PersistRecent(self.loading.recent_diagrams.clone()));
                effects.push(info(message));
                effects
            }
            Err(err) => {
                log::warn!("failed to save: {err}");
                smallvec![error(FailureCategory::FailedToSave)]
            }
        }
    }

    /// The current log as a downloadable `.draft` file.
    pub fn export_local(&self) -> Result<LocalExport, LogError> {
        Ok(LocalExport {
            file_name: file_name(self.loading.token_to_read.as_deref()),
            contents: self.action_log().to_json()?,
        })
    }

    /// Replace the session with the contents of a `.draft` file. The result
    /// is unsaved: it has no tokens.
    pub fn import_local(&mut self, contents: &str) -> Effects {
        self.supersede();
        match ActionLog::from_json(contents) {
            Ok(decoded) => {
                self.editor = replay(&decoded.log).with_max_depth(self.config.max_history);
                self.loading.reset();
                log::info!(
                    "imported {} action(s), skipped {}",
                    decoded.log.len(),
                    decoded.skipped
                );
                smallvec![info("Successfully loaded diagram.")]
            }
            Err(err) => {
                log::warn!("failed to import: {err}");
                self.reset();
                smallvec![error(FailureCategory::FailedToLoad)]
            }
        }
    }

    // ─── Bridge helpers ──────────────────────────────────────────────────

    /// Load through `bridge`, holding the session for the duration.
    pub async fn load<B: PersistenceBridge>(
        &mut self,
        bridge: &B,
        token_to_read: &str,
        token_to_write: Option<&str>,
        navigate: bool,
    ) -> Effects {
        let Some(ticket) = self.begin_load(token_to_read, token_to_write, navigate) else {
            return Effects::new();
        };
        let result = bridge.read(ticket.token_to_read()).await;
        self.finish_load(ticket, result)
    }

    /// Save through `bridge`, holding the session for the duration.
    pub async fn save<B: PersistenceBridge>(&mut self, bridge: &B, navigate: bool) -> Effects {
        let Some(ticket) = self.begin_save(navigate) else {
            return Effects::new();
        };
        let result = bridge.write(ticket.tokens(), ticket.log()).await;
        self.finish_save(ticket, result)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn supersede(&mut self) {
        self.generation += 1;
        self.pending_load = None;
        self.saving = false;
        self.sync_busy();
    }

    fn reset(&mut self) {
        self.editor = new_history().with_max_depth(self.config.max_history);
        self.loading.reset();
        self.pending_load = None;
        self.sync_busy();
    }

    fn sync_busy(&mut self) {
        self.loading.is_loading = self.pending_load.is_some() || self.saving;
    }
}

fn info(message: impl Into<String>) -> SessionEffect {
    SessionEffect::Toast(Toast::Info(message.into()))
}

fn error(category: FailureCategory) -> SessionEffect {
    SessionEffect::Toast(Toast::Error(category.message().to_string()))
}
