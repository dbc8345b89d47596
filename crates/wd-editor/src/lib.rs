pub mod autosave;
pub mod bridge;
pub mod config;
pub mod history;
pub mod loading;
pub mod session;

pub use autosave::{AutosaveHandle, spawn_autosave};
pub use bridge::{BridgeError, FailureCategory, FileBridge, MemoryBridge, PersistenceBridge, SavedTokens};
pub use config::{ConfigError, SessionConfig};
pub use history::UndoableState;
pub use loading::{LoadingState, RecentDiagram, RecentDiagrams, RecentStore, RecentStoreError};
pub use session::{
    EditorHistory, Effects, LoadTicket, LocalExport, SaveTicket, Session, SessionEffect, Toast,
    new_history, replay,
};
