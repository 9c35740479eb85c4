//! Note mutation service.
//!
//! # Responsibility
//! - Provide create/update/delete/revert for versioned notes.
//! - Apply the history recorder exactly once per content-changing mutation.
//! - Remap store failures into `CoreError` at every call site.
//!
//! # Invariants
//! - No store access happens without a signed-in user.
//! - Whitespace-only content is rejected before any store access.
//! - `update_note` is a blind last-write-wins replace built from the
//!   caller's last-known state; `revert_note` re-reads the store first.
//! - `creator_email` is carried over unchanged by every mutation.
//! - A note's `timestamp` is the store's commit time for that write, never
//!   a clock read taken before it.

use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityWatch;
use crate::model::category::normalize_category_name;
use crate::model::identity::UserIdentity;
use crate::model::note::{HistoryEntry, Note, NoteDocument, NoteId};
use crate::service::history::history_after_mutation;
use crate::store::{Collection, DocumentStore, StoredDocument};
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Mutation service over one document store.
pub struct NoteService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    identity: IdentityWatch,
}

impl<S: DocumentStore + ?Sized> NoteService<S> {
    /// Creates a service acting as whoever `identity` reports at call time.
    pub fn new(store: Arc<S>, identity: IdentityWatch) -> Self {
        Self { store, identity }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Creates a note with empty history and returns its store key.
    ///
    /// # Errors
    /// - `Unauthenticated` when nobody is signed in.
    /// - `InvalidInput` when `content` is empty after trimming.
    pub async fn create_note(&self, content: &str, category: Option<&str>) -> CoreResult<NoteId> {
        let started_at = Instant::now();
        let result = self.create_note_inner(content, category).await;
        log_outcome("note_create", started_at, result.as_ref().ok().copied(), &result);
        result
    }

    async fn create_note_inner(&self, content: &str, category: Option<&str>) -> CoreResult<NoteId> {
        let user = self.acting_user()?;
        let content = normalize_content(content)?;

        let document = NoteDocument {
            content,
            creator_email: user.email,
            timestamp: 0,
            category: normalize_category(category),
            history: Vec::new(),
        };
        let commit = self
            .store
            .create(Collection::Notes, encode(&document)?)
            .await?;
        Ok(commit.id)
    }

    /// Replaces a note using the caller's last-known state.
    ///
    /// Appends one history entry built from `last_known` and overwrites the
    /// stored document. Changes committed by other clients after
    /// `last_known` was read are discarded (last write wins).
    ///
    /// `category` becomes the note's category; `None` clears it.
    pub async fn update_note(
        &self,
        last_known: &Note,
        new_content: &str,
        category: Option<&str>,
    ) -> CoreResult<Note> {
        let started_at = Instant::now();
        let result = self
            .update_note_inner(last_known, new_content, category)
            .await;
        log_outcome("note_update", started_at, Some(last_known.id), &result);
        result
    }

    async fn update_note_inner(
        &self,
        last_known: &Note,
        new_content: &str,
        category: Option<&str>,
    ) -> CoreResult<Note> {
        let user = self.acting_user()?;
        let content = normalize_content(new_content)?;
        let history = history_after_mutation(last_known, &user);

        let mut document = NoteDocument {
            content,
            creator_email: last_known.creator_email.clone(),
            timestamp: 0,
            category: normalize_category(category),
            history,
        };
        let commit = self
            .store
            .replace(Collection::Notes, last_known.id, encode(&document)?)
            .await?;
        document.timestamp = commit.committed_at;
        Ok(Note::from_document(last_known.id, document))
    }

    /// Deletes a note and its whole history.
    pub async fn delete_note(&self, note_id: NoteId) -> CoreResult<()> {
        let started_at = Instant::now();
        let result = self.delete_note_inner(note_id).await;
        log_outcome("note_delete", started_at, Some(note_id), &result);
        result
    }

    async fn delete_note_inner(&self, note_id: NoteId) -> CoreResult<()> {
        self.acting_user()?;
        self.store.delete(Collection::Notes, note_id).await?;
        Ok(())
    }

    /// Sets the note's content back to `target.content`.
    ///
    /// Re-reads the note first, appends a snapshot of that authoritative
    /// state, and keeps every existing entry (including `target`) in place.
    ///
    /// # Errors
    /// - `NotFound` when the note no longer exists.
    /// - `InvalidInput` when `target` is not in the note's current history.
    pub async fn revert_note(&self, note_id: NoteId, target: &HistoryEntry) -> CoreResult<Note> {
        let started_at = Instant::now();
        let result = self.revert_note_inner(note_id, target).await;
        log_outcome("note_revert", started_at, Some(note_id), &result);
        result
    }

    async fn revert_note_inner(&self, note_id: NoteId, target: &HistoryEntry) -> CoreResult<Note> {
        let user = self.acting_user()?;
        let current = self
            .read_note(note_id)
            .await?
            .ok_or(CoreError::NotFound(note_id))?;
        if !current.history.contains(target) {
            return Err(CoreError::InvalidInput(
                "revert target is not part of the note's history".to_string(),
            ));
        }

        let history = history_after_mutation(&current, &user);
        let mut document = NoteDocument {
            content: target.content.clone(),
            creator_email: current.creator_email,
            timestamp: 0,
            category: current.category,
            history,
        };
        let commit = self
            .store
            .replace(Collection::Notes, note_id, encode(&document)?)
            .await?;
        document.timestamp = commit.committed_at;
        Ok(Note::from_document(note_id, document))
    }

    /// Reads the authoritative current state of one note.
    ///
    /// Reads do not require a signed-in user.
    pub async fn get_note(&self, note_id: NoteId) -> CoreResult<Option<Note>> {
        self.read_note(note_id).await
    }

    async fn read_note(&self, note_id: NoteId) -> CoreResult<Option<Note>> {
        match self.store.get(Collection::Notes, note_id).await? {
            Some(stored) => decode_note(&stored).map(Some),
            None => Ok(None),
        }
    }

    fn acting_user(&self) -> CoreResult<UserIdentity> {
        self.identity.current().ok_or(CoreError::Unauthenticated)
    }
}

/// Trims note content and rejects empty results.
pub fn normalize_content(content: &str) -> CoreResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "note content cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Maps blank category names to "uncategorized".
pub fn normalize_category(category: Option<&str>) -> Option<String> {
    category.and_then(normalize_category_name)
}

fn encode(document: &NoteDocument) -> CoreResult<Value> {
    serde_json::to_value(document)
        .map_err(|err| CoreError::StoreUnavailable(format!("cannot encode note: {err}")))
}

fn decode_note(stored: &StoredDocument) -> CoreResult<Note> {
    let note = Note::from_stored(stored).map_err(|err| {
        CoreError::StoreUnavailable(format!("stored note {} is malformed: {err}", stored.id))
    })?;
    if !note.history_is_ordered() {
        warn!(
            "event=note_decode module=service status=warn note_id={} reason=history_out_of_order",
            note.id
        );
    }
    Ok(note)
}

fn log_outcome<T>(
    event: &str,
    started_at: Instant,
    note_id: Option<NoteId>,
    result: &CoreResult<T>,
) {
    let note_id = note_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match result {
        Ok(_) => info!(
            "event={event} module=service status=ok note_id={note_id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(CoreError::StoreUnavailable(message)) => error!(
            "event={event} module=service status=error note_id={note_id} duration_ms={} error_code=store_unavailable error={message}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={event} module=service status=error note_id={note_id} duration_ms={} error_code={}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}
