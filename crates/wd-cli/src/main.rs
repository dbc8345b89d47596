//! `wd`: replay, inspect, and store WireDraft `.draft` action logs.
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` to see reducer
//! no-ops and skipped records.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use wd_core::selection::resolve;
use wd_core::{ActionLog, DiagramId, EditorState, ItemId};
use wd_editor::{
    Effects, FileBridge, RecentStore, Session, SessionConfig, SessionEffect, Toast, replay,
};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// File holding the recent-diagrams record inside a store directory.
const RECENT_FILE: &str = "recent.json";

#[derive(Parser, Debug)]
#[command(name = "wd", version)]
#[command(about = "Replay, inspect, and store WireDraft action logs")]
struct Cli {
    /// Session configuration (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a .draft file and print a summary of the resulting state
    Replay { file: PathBuf },

    /// Print the selection that requesting ITEMs would produce
    Select {
        file: PathBuf,
        #[arg(long)]
        diagram: String,
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Store a .draft file in a directory store and print its tokens
    Save {
        file: PathBuf,
        #[arg(long, value_name = "DIR")]
        store: PathBuf,
    },

    /// Load a stored diagram and export its log
    Load {
        read_token: String,
        #[arg(long, value_name = "DIR")]
        store: PathBuf,
        #[arg(long)]
        write_token: Option<String>,
        /// Output file (default: <READ_TOKEN>.draft)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };

    match cli.command {
        Command::Replay { file } => replay_file(&file),
        Command::Select {
            file,
            diagram,
            items,
        } => select(&file, &diagram, &items),
        Command::Save { file, store } => save(config, &file, &store).await,
        Command::Load {
            read_token,
            store,
            write_token,
            out,
        } => load(config, &read_token, write_token.as_deref(), &store, out).await,
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn replay_file(file: &Path) -> CliResult<()> {
    let decoded = ActionLog::from_json(&std::fs::read_to_string(file)?)?;
    let editor = replay(&decoded.log);
    print!("{}", summary(editor.present(), decoded.skipped));
    Ok(())
}

fn select(file: &Path, diagram: &str, items: &[String]) -> CliResult<()> {
    let decoded = ActionLog::from_json(&std::fs::read_to_string(file)?)?;
    let state = wd_core::fold(&decoded.log);
    let diagram = state
        .diagram(DiagramId::intern(diagram))
        .ok_or_else(|| format!("no diagram `{diagram}` in {}", file.display()))?;

    let mut selected: Vec<String> = resolve(diagram, items.iter().map(|id| ItemId::intern(id)))
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    selected.sort();
    for id in selected {
        println!("{id}");
    }
    Ok(())
}

async fn save(config: SessionConfig, file: &Path, store: &Path) -> CliResult<()> {
    let bridge = FileBridge::create(store).await?;
    let recent = RecentStore::new(store.join(RECENT_FILE));
    let mut session = Session::with_recent(config, recent.load().await?);

    let contents = tokio::fs::read_to_string(file).await?;
    apply(session.import_local(&contents), &recent).await?;
    apply(session.save(&bridge, false).await, &recent).await?;

    let tokens = session
        .loading()
        .saved_tokens()
        .ok_or("save produced no tokens")?;
    println!("read token:  {}", tokens.read_token);
    println!("write token: {}", tokens.write_token);
    Ok(())
}

async fn load(
    config: SessionConfig,
    read_token: &str,
    write_token: Option<&str>,
    store: &Path,
    out: Option<PathBuf>,
) -> CliResult<()> {
    let bridge = FileBridge::new(store);
    let recent = RecentStore::new(store.join(RECENT_FILE));
    let mut session = Session::with_recent(config, recent.load().await?);

    apply(session.load(&bridge, read_token, write_token, false).await, &recent).await?;

    let export = session.export_local()?;
    let out = out.unwrap_or_else(|| PathBuf::from(&export.file_name));
    tokio::fs::write(&out, export.contents).await?;
    print!("{}", summary(session.present(), 0));
    println!("exported to {}", out.display());
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Carry out session effects. An error toast aborts the command.
async fn apply(effects: Effects, recent: &RecentStore) -> CliResult<()> {
    for effect in effects {
        match effect {
            SessionEffect::Toast(Toast::Info(message)) => eprintln!("{message}"),
            SessionEffect::Toast(Toast::Error(message)) => return Err(message.into()),
            SessionEffect::PersistRecent(diagrams) => recent.save(&diagrams).await?,
            SessionEffect::Navigate(route) => log::debug!("navigate to {route:?}"),
        }
    }
    Ok(())
}

fn summary(state: &EditorState, skipped: usize) -> String {
    let mut out = String::new();
    if skipped > 0 {
        out.push_str(&format!("skipped records: {skipped}\n"));
    }
    let selected = state
        .selected_diagram_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    out.push_str(&format!("selected diagram: {selected}\n"));
    out.push_str(&format!(
        "canvas: {}x{} {}\n",
        state.size.width,
        state.size.height,
        state.color.to_hex()
    ));
    for diagram in state.ordered_diagrams() {
        let roots: Vec<String> = diagram.root_ids.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "diagram {}: {} item(s), roots [{}]\n",
            diagram.id,
            diagram.items.len(),
            roots.join(", ")
        ));
    }
    out
}
