//! Integration tests: session lifecycle (wd-editor).
//!
//! New session, load by replay, load failure fallback, request ordering,
//! and save bookkeeping, driven through the in-memory bridge.

use pretty_assertions::assert_eq;
use wd_core::*;
use wd_editor::*;

fn session() -> Session {
    Session::new(SessionConfig::default())
}

fn grouping_log() -> ActionLog {
    ActionLog::from_json(include_str!("fixtures/grouping.draft"))
        .unwrap()
        .log
}

fn toasts(effects: &Effects) -> Vec<Toast> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::Toast(toast) => Some(toast.clone()),
            _ => None,
        })
        .collect()
}

fn info(message: &str) -> Toast {
    Toast::Info(message.to_string())
}

fn error(message: &str) -> Toast {
    Toast::Error(message.to_string())
}

/// Store `log` in `bridge` and return its tokens.
async fn stored(bridge: &MemoryBridge, log: &ActionLog) -> SavedTokens {
    bridge.write(None, log).await.unwrap()
}

// ─── New session ────────────────────────────────────────────────────────

#[test]
fn new_session_has_single_selected_diagram() {
    let mut session = session();
    session.dispatch(Action::add_diagram());
    assert_eq!(session.present().diagrams.len(), 2);

    let effects = session.new_diagram(true);
    assert_eq!(effects.to_vec(), vec![SessionEffect::Navigate(None)]);

    let present = session.present();
    assert_eq!(present.diagrams.len(), 1);
    assert!(present.selected_diagram().is_some());
    assert!(!session.can_undo());
    assert_eq!(session.loading().token_to_read, None);
    assert_eq!(session.loading().token_to_write, None);
}

// ─── Load ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_replays_log_with_empty_history() {
    let bridge = MemoryBridge::new();
    let tokens = stored(&bridge, &grouping_log()).await;
    let mut session = session();

    let effects = session.load(&bridge, &tokens.read_token, None, true).await;
    assert_eq!(
        effects.to_vec(),
        vec![
            SessionEffect::Navigate(Some(tokens.read_token.clone())),
            SessionEffect::Toast(info("Successfully loaded diagram.")),
        ]
    );

    let diagram = session.present().selected_diagram().unwrap();
    assert_eq!(diagram.id, DiagramId::intern("1"));
    assert_eq!(diagram.root_ids, vec![ItemId::intern("G")]);
    assert!(diagram.selected_ids.is_empty());
    assert!(!session.can_undo());
    assert_eq!(session.loading().token_to_read.as_deref(), Some(tokens.read_token.as_str()));
    assert!(!session.loading().is_loading);
}

#[tokio::test]
async fn loaded_log_is_preserved_for_the_next_save() {
    let bridge = MemoryBridge::new();
    let log = grouping_log();
    let tokens = stored(&bridge, &log).await;
    let mut session = session();
    session.load(&bridge, &tokens.read_token, None, false).await;

    // Baseline and replayed actions, plus the selection reset.
    let saved = session.action_log();
    assert_eq!(&saved.actions()[..log.len()], log.actions());
    assert_eq!(&*fold(&saved), &**session.present());
}

#[tokio::test]
async fn empty_log_loads_as_new_session() {
    let bridge = MemoryBridge::new();
    let tokens = stored(&bridge, &ActionLog::default()).await;
    let mut session = session();

    let effects = session.load(&bridge, &tokens.read_token, None, false).await;
    assert_eq!(toasts(&effects), vec![info("Successfully loaded diagram.")]);

    let present = session.present();
    assert_eq!(present.diagrams.len(), 1);
    assert!(present.selected_diagram().unwrap().items.is_empty());
    assert!(!session.can_undo());
}

#[tokio::test]
async fn dangling_diagram_selection_is_repaired() {
    let (one, two) = (DiagramId::intern("dg-1"), DiagramId::intern("dg-2"));
    let log = ActionLog::new(vec![
        Action::AddDiagram { diagram_id: one },
        Action::AddDiagram { diagram_id: two },
        Action::SelectDiagram { diagram_id: two },
        Action::RemoveDiagram { diagram_id: two },
    ]);
    let bridge = MemoryBridge::new();
    let tokens = stored(&bridge, &log).await;
    let mut session = session();
    session.load(&bridge, &tokens.read_token, None, false).await;

    assert_eq!(session.present().selected_diagram_id, Some(one));
    assert!(session.present().check_invariants().is_ok());
}

#[tokio::test]
async fn load_failure_falls_back_to_new_session() {
    let bridge = MemoryBridge::new();
    let mut session = session();
    session.dispatch(Action::add_diagram());

    let effects = session.load(&bridge, "missing", Some("w"), true).await;
    assert_eq!(effects.to_vec(), vec![SessionEffect::Toast(error("Failed to load diagram."))]);
    assert_eq!(session.present().diagrams.len(), 1);
    assert!(!session.can_undo());
    assert_eq!(session.loading().token_to_read, None);
    assert!(!session.loading().is_loading);
}

#[test]
fn load_guard_ignores_empty_and_current_tokens() {
    let mut session = session();
    assert!(session.begin_load("", None, false).is_none());

    let ticket = session.begin_load("abc", None, false).unwrap();
    assert!(session.loading().is_loading);
    assert!(session.begin_load("abc", None, false).is_none());

    session.finish_load(ticket, Ok(grouping_log()));
    assert!(session.begin_load("abc", None, false).is_none());
    assert!(session.begin_load("other", None, false).is_some());
}

#[test]
fn last_requested_load_wins() {
    let mut session = session();
    let first = session.begin_load("first", None, false).unwrap();
    let second = session.begin_load("second", None, false).unwrap();

    let second_log = ActionLog::new(vec![Action::AddDiagram {
        diagram_id: DiagramId::intern("lw-second"),
    }]);
    let effects = session.finish_load(second, Ok(second_log));
    assert_eq!(toasts(&effects), vec![info("Successfully loaded diagram.")]);

    // The earlier request resolves late and must not overwrite anything.
    let effects = session.finish_load(first, Ok(grouping_log()));
    assert!(effects.is_empty());
    assert_eq!(session.loading().token_to_read.as_deref(), Some("second"));
    assert!(session.present().diagram(DiagramId::intern("lw-second")).is_some());
}

#[test]
fn new_session_supersedes_outstanding_load() {
    let mut session = session();
    let ticket = session.begin_load("late", None, false).unwrap();
    session.new_diagram(false);
    let fresh = std::sync::Arc::clone(session.present());

    assert!(session.finish_load(ticket, Ok(grouping_log())).is_empty());
    assert!(std::sync::Arc::ptr_eq(session.present(), &fresh));
    assert!(!session.loading().is_loading);
}

// ─── Save ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_save_mints_tokens_and_records_recent() {
    let bridge = MemoryBridge::new();
    let mut session = session();

    let effects = session.save(&bridge, true).await;
    let tokens = session.loading().saved_tokens().unwrap();
    let url = format!("https://mydraft.cc/{}", tokens.read_token);

    assert_eq!(
        effects.to_vec(),
        vec![
            SessionEffect::Navigate(Some(tokens.read_token.clone())),
            SessionEffect::PersistRecent(session.loading().recent_diagrams.clone()),
            SessionEffect::Toast(info(&format!("Diagram saved under {url}."))),
        ]
    );
    let recent = &session.loading().recent_diagrams[&tokens.read_token];
    assert_eq!(recent.token_to_write, tokens.write_token);
    assert!(recent.date > 0);

    let stored = bridge.read(&tokens.read_token).await.unwrap();
    assert_eq!(stored, session.action_log());
}

#[tokio::test]
async fn second_save_updates_in_place() {
    let bridge = MemoryBridge::new();
    let mut session = session();
    session.save(&bridge, false).await;
    let tokens = session.loading().saved_tokens().unwrap();

    let diagram_id = session.present().selected_diagram_id.unwrap();
    session.dispatch(Action::add_item(diagram_id, "Button", Geometry::rect(0.0, 0.0, 80.0, 24.0)));
    let effects = session.save(&bridge, false).await;

    assert_eq!(toasts(&effects), vec![info("Diagram saved.")]);
    assert_eq!(session.loading().saved_tokens(), Some(tokens.clone()));
    assert_eq!(bridge.write_count(), 2);
    assert_eq!(bridge.read(&tokens.read_token).await.unwrap(), session.action_log());
}

#[tokio::test]
async fn failed_save_leaves_editor_untouched() {
    let bridge = MemoryBridge::new();
    bridge.set_offline(true);
    let mut session = session();
    let before = session.editor().clone();

    let effects = session.save(&bridge, true).await;
    assert_eq!(effects.to_vec(), vec![SessionEffect::Toast(error("Failed to save diagram."))]);
    assert_eq!(session.editor(), &before);
    assert_eq!(session.loading().saved_tokens(), None);
    assert!(!session.loading().is_loading);
}

#[test]
fn save_guard_refuses_overlapping_saves() {
    let mut session = session();
    let ticket = session.begin_save(false).unwrap();
    assert!(session.begin_save(false).is_none());

    let tokens = SavedTokens::mint();
    session.finish_save(ticket, Ok(tokens));
    assert!(session.begin_save(false).is_some());
}

#[test]
fn save_is_refused_while_loading() {
    let mut session = session();
    let _ticket = session.begin_load("pending", None, false).unwrap();
    assert!(session.begin_save(false).is_none());
}

#[test]
fn save_for_superseded_session_is_discarded() {
    let mut session = session();
    let ticket = session.begin_save(false).unwrap();
    session.new_diagram(false);

    assert!(session.finish_save(ticket, Ok(SavedTokens::mint())).is_empty());
    assert_eq!(session.loading().saved_tokens(), None);
    assert!(session.loading().recent_diagrams.is_empty());
}

// ─── Local files ────────────────────────────────────────────────────────

#[test]
fn export_uses_read_token_for_file_name() {
    let mut session = session();
    assert_eq!(session.export_local().unwrap().file_name, "diagram.draft");

    let ticket = session.begin_load("tok", None, false).unwrap();
    session.finish_load(ticket, Ok(grouping_log()));
    let export = session.export_local().unwrap();
    assert_eq!(export.file_name, "tok.draft");

    let decoded = ActionLog::from_json(&export.contents).unwrap();
    assert_eq!(decoded.log, session.action_log());
}

#[test]
fn import_replays_without_tokens() {
    let mut session = session();
    let effects = session.import_local(include_str!("fixtures/grouping.draft"));
    assert_eq!(toasts(&effects), vec![info("Successfully loaded diagram.")]);
    assert_eq!(
        session.present().selected_diagram().unwrap().root_ids,
        vec![ItemId::intern("G")]
    );
    assert_eq!(session.loading().token_to_read, None);

    let effects = session.import_local("{ not json");
    assert_eq!(toasts(&effects), vec![error("Failed to load diagram.")]);
    assert!(session.present().selected_diagram().unwrap().items.is_empty());
}
