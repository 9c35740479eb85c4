//! NoteKeep command-line client.
//!
//! # Responsibility
//! - Drive the notes board against a local SQLite store.
//! - Keep output line-oriented and deterministic for scripting.

use clap::{Parser, Subcommand};
use log::info;
use notekeep_core::{
    core_version, ping, CoreConfig, CoreError, IdentityProvider, NoteId, NotesBoard, SqliteStore,
    UserIdentity,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_DB_FILE_NAME: &str = "notekeep.sqlite3";

#[derive(Parser)]
#[command(name = "notekeep")]
#[command(about = "Shared notes with full edit history")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Email of the acting user; mutations fail without it
    #[arg(long, global = true)]
    user: Option<String>,

    /// Stable account id of the acting user; defaults to the email
    #[arg(long, global = true, requires = "user")]
    user_id: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a note
    Add {
        content: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Replace a note's content, recording the previous version
    Edit {
        id: NoteId,
        content: String,
        /// New category; the current one is kept when omitted
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Delete a note and its history
    Delete { id: NoteId },
    /// Restore the content of one history entry
    Revert { id: NoteId, index: usize },
    /// List notes, optionally narrowed to one category
    List {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show a note's history
    History { id: NoteId },
    /// Register a category name
    AddCategory { name: String },
    /// List distinct category names
    Categories,
    /// Check core linkage
    Ping,
    /// Print the core version
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Ping => {
            println!("notekeep_core ping={}", ping());
            return Ok(());
        }
        Commands::Version => {
            println!("notekeep_core version={}", core_version());
            return Ok(());
        }
        _ => {}
    }

    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir.clone();
    }
    if cli.db.is_some() {
        config.database_path = cli.db.clone();
    }
    config.validate()?;
    config.init_logging()?;

    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME));
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let identity = match acting_user(&cli) {
        Some(user) => IdentityProvider::signed_in(user),
        None => IdentityProvider::new(),
    };
    info!(
        "event=cli_start module=cli status=ok signed_in={}",
        identity.current().is_some()
    );

    let mut board = NotesBoard::open(store, identity.watch(), config.resubscribe.clone()).await?;
    let outcome = execute(&mut board, cli.command).await;
    board.close();
    outcome
}

fn acting_user(cli: &Cli) -> Option<UserIdentity> {
    let email = cli.user.as_deref()?;
    let id = cli.user_id.as_deref().unwrap_or(email);
    Some(UserIdentity::new(id, email))
}

async fn execute(
    board: &mut NotesBoard<SqliteStore>,
    command: Commands,
) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Add { content, category } => {
            board.set_draft(&content, category.as_deref());
            let id = board.save().await?;
            println!("{id}");
        }
        Commands::Edit {
            id,
            content,
            category,
        } => {
            board.begin_edit(id)?;
            let category = category.or_else(|| board.draft().category.clone());
            board.set_draft(&content, category.as_deref());
            board.save().await?;
            println!("{id}");
        }
        Commands::Delete { id } => {
            board.delete(id).await?;
            println!("deleted {id}");
        }
        Commands::Revert { id, index } => {
            board.revert(id, index).await?;
            if board.revert_succeeded() {
                println!("Reverted successfully.");
            }
        }
        Commands::List { category } => {
            board.set_category_filter(category.as_deref()).await?;
            for note in board.notes() {
                let category = note.category.as_deref().unwrap_or("-");
                println!("{}\t{}\t{}\t{}", note.id, category, note.updated_at, note.content);
                if let Some(last_modified) = &note.last_modified {
                    println!("\t{last_modified}");
                }
            }
        }
        Commands::History { id } => {
            if board.note(id).is_none() {
                return Err(Box::new(CoreError::NotFound(id)));
            }
            board.toggle_history(id);
            for line in board.history_panel(id).lines() {
                println!("{line}");
            }
        }
        Commands::AddCategory { name } => {
            let id = board.add_category(&name).await?;
            println!("{id}");
        }
        Commands::Categories => {
            for name in board.category_names() {
                println!("{name}");
            }
        }
        Commands::Ping | Commands::Version => {}
    }
    Ok(())
}
