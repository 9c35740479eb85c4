//! Domain model for versioned notes and their categories.
//!
//! # Responsibility
//! - Define the persisted document shapes shared by service and sync layers.
//! - Keep the note/history invariants checkable in one place.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.
//! - History is append-only and strictly time ordered.
//! - Deletion is a hard delete; no tombstones are kept.

pub mod category;
pub mod identity;
pub mod note;
