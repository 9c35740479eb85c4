//! Versioned note model.
//!
//! # Responsibility
//! - Define the note document persisted in the `notes` collection.
//! - Define `HistoryEntry`, the snapshot of a superseded note state.
//!
//! # Invariants
//! - `creator_email` never changes after create.
//! - `history` is only ever appended to, oldest entry first.
//! - `history[i].timestamp < history[i + 1].timestamp < timestamp`.

use crate::store::{DocId, StoredDocument};
use serde::{Deserialize, Serialize};

/// Store-assigned identity of a note.
pub type NoteId = DocId;

/// Store logical time in Unix epoch milliseconds.
pub type Timestamp = i64;

/// Snapshot of note state immediately before a superseding mutation.
///
/// Owned by exactly one note and never referenced from elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Content before the superseding mutation.
    pub content: String,
    /// Moment that content became current.
    pub timestamp: Timestamp,
    /// User who performed the superseding mutation.
    pub modifier_email: String,
}

/// Persisted body of one note document.
///
/// Serialized with camelCase keys; `category` is omitted when absent so an
/// equality filter on `category` never matches uncategorized notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    pub content: String,
    pub creator_email: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Note as seen by readers: current state, store key and full history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub creator_email: String,
    pub timestamp: Timestamp,
    pub category: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl Note {
    /// Attaches a store key to a decoded note document.
    pub fn from_document(id: NoteId, document: NoteDocument) -> Self {
        Self {
            id,
            content: document.content,
            creator_email: document.creator_email,
            timestamp: document.timestamp,
            category: document.category,
            history: document.history,
        }
    }

    /// Decodes a note from a stored document.
    pub fn from_stored(stored: &StoredDocument) -> Result<Self, serde_json::Error> {
        let document: NoteDocument = serde_json::from_value(stored.data.clone())?;
        Ok(Self::from_document(stored.id, document))
    }

    /// Returns the persisted body for this note.
    pub fn to_document(&self) -> NoteDocument {
        NoteDocument {
            content: self.content.clone(),
            creator_email: self.creator_email.clone(),
            timestamp: self.timestamp,
            category: self.category.clone(),
            history: self.history.clone(),
        }
    }

    /// Returns who last superseded a version of this note and when that
    /// superseded version had become current.
    ///
    /// `None` for notes that were never edited.
    pub fn last_modified(&self) -> Option<(&str, Timestamp)> {
        self.history
            .last()
            .map(|entry| (entry.modifier_email.as_str(), entry.timestamp))
    }

    /// Checks the strict history time ordering invariant.
    pub fn history_is_ordered(&self) -> bool {
        let ordered_pairs = self
            .history
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp);
        let ends_before_current = self
            .history
            .last()
            .map_or(true, |entry| entry.timestamp < self.timestamp);
        ordered_pairs && ends_before_current
    }
}
