//! Core domain logic for NoteKeep.
//! This crate is the single source of truth for note versioning invariants.

pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use board::{format_timestamp, HistoryPanel, NoteDraft, NoteSummary, NotesBoard};
pub use config::{ConfigError, CoreConfig, ResubscribePolicy};
pub use error::{CoreError, CoreResult};
pub use identity::{IdentityProvider, IdentityWatch};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::category::Category;
pub use model::identity::UserIdentity;
pub use model::note::{HistoryEntry, Note, NoteId, Timestamp};
pub use service::category_service::CategoryRegistry;
pub use service::note_service::NoteService;
pub use store::{
    Collection, Commit, DocId, DocumentStore, Filter, LogicalClock, MemoryStore, SqliteStore,
    StoreError,
};
pub use sync::category_view::CategoryList;
pub use sync::note_view::NoteView;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
