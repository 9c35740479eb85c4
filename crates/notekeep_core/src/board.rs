//! Notes board use-case facade.
//!
//! # Responsibility
//! - Combine mutations, the live note view and the category list into the
//!   state one interactive client needs: draft, selection, history panel.
//! - Keep the most recent failure for display instead of dropping it.
//!
//! # Invariants
//! - Every operation either clears `last_error` or replaces it.
//! - A committed mutation is reported as succeeded even when the views
//!   cannot follow it; the view failure is kept in `last_error`.
//! - Edits are saved against the note as last seen by the live view.
//! - Board state never outlives the store subscriptions it holds.

use crate::config::ResubscribePolicy;
use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityWatch;
use crate::model::note::{HistoryEntry, Note, NoteId, Timestamp};
use crate::service::category_service::CategoryRegistry;
use crate::service::note_service::NoteService;
use crate::store::{DocId, DocumentStore};
use crate::sync::category_view::CategoryList;
use crate::sync::note_view::NoteView;
use chrono::{Local, TimeZone};
use log::warn;
use std::collections::BTreeSet;
use std::sync::Arc;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const INVALID_DATE: &str = "Invalid Date";
const NO_HISTORY: &str = "no history available";

/// Formats a store timestamp in local time; out-of-range values render as
/// `Invalid Date`.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    Local
        .timestamp_millis_opt(timestamp)
        .single()
        .map(|moment| moment.format(DISPLAY_TIME_FORMAT).to_string())
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

/// Unsaved editor contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub content: String,
    pub category: Option<String>,
}

/// Display projection of one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub id: NoteId,
    pub content: String,
    pub category: Option<String>,
    pub creator_email: String,
    pub updated_at: String,
    /// `Last modified by <email> on <date>` for edited notes.
    pub last_modified: Option<String>,
}

impl NoteSummary {
    fn from_note(note: &Note) -> Self {
        Self {
            id: note.id,
            content: note.content.clone(),
            category: note.category.clone(),
            creator_email: note.creator_email.clone(),
            updated_at: format_timestamp(note.timestamp),
            last_modified: note.last_modified().map(|(email, timestamp)| {
                format!(
                    "Last modified by {email} on {}",
                    format_timestamp(timestamp)
                )
            }),
        }
    }
}

/// One rendered history line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    /// Position in the note's history, usable with `NotesBoard::revert`.
    pub index: usize,
    pub content: String,
    pub modified_by: String,
    pub modified_at: String,
}

/// State of the history panel for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryPanel {
    Collapsed,
    Empty,
    Entries(Vec<HistoryLine>),
}

impl HistoryPanel {
    /// Text rows for simple renderers.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Collapsed => Vec::new(),
            Self::Empty => vec![NO_HISTORY.to_string()],
            Self::Entries(entries) => entries
                .iter()
                .map(|line| {
                    format!(
                        "[{}] {} (by {} at {})",
                        line.index, line.content, line.modified_by, line.modified_at
                    )
                })
                .collect(),
        }
    }
}

/// Interactive client state over one store.
pub struct NotesBoard<S: DocumentStore + ?Sized> {
    notes: NoteService<S>,
    registry: CategoryRegistry<S>,
    view: NoteView<S>,
    categories: CategoryList<S>,
    draft: NoteDraft,
    editing: Option<NoteId>,
    expanded_history: Option<NoteId>,
    last_error: Option<CoreError>,
    revert_succeeded: bool,
}

impl<S: DocumentStore + ?Sized> NotesBoard<S> {
    /// Opens the board with an unfiltered note view.
    pub async fn open(
        store: Arc<S>,
        identity: IdentityWatch,
        policy: ResubscribePolicy,
    ) -> CoreResult<Self> {
        let view = NoteView::open(Arc::clone(&store), None, policy.clone()).await?;
        let registry = CategoryRegistry::new(Arc::clone(&store), identity.clone(), policy);
        let categories = registry.list_categories().await?;
        Ok(Self {
            notes: NoteService::new(store, identity),
            registry,
            view,
            categories,
            draft: NoteDraft::default(),
            editing: None,
            expanded_history: None,
            last_error: None,
            revert_succeeded: false,
        })
    }

    pub fn draft(&self) -> &NoteDraft {
        &self.draft
    }

    pub fn set_draft(&mut self, content: &str, category: Option<&str>) {
        self.draft.content = content.to_string();
        self.draft.category = category.map(str::to_string);
    }

    /// Note currently being edited, if any.
    pub fn editing(&self) -> Option<NoteId> {
        self.editing
    }

    /// Loads a visible note into the draft for editing.
    pub fn begin_edit(&mut self, note_id: NoteId) -> CoreResult<()> {
        self.revert_succeeded = false;
        let result = match self.view.get(note_id) {
            Some(note) => {
                self.draft = NoteDraft {
                    content: note.content.clone(),
                    category: note.category.clone(),
                };
                self.editing = Some(note_id);
                Ok(())
            }
            None => Err(CoreError::NotFound(note_id)),
        };
        self.record(result)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.draft = NoteDraft::default();
    }

    /// Saves the draft: updates the note being edited, or creates a new one.
    ///
    /// The draft is kept on failure so nothing typed is lost.
    pub async fn save(&mut self) -> CoreResult<NoteId> {
        let content = self.draft.content.clone();
        let category = self.draft.category.clone();
        let result = match self.editing {
            Some(note_id) => match self.view.get(note_id).cloned() {
                Some(last_known) => self
                    .notes
                    .update_note(&last_known, &content, category.as_deref())
                    .await
                    .map(|note| note.id),
                None => Err(CoreError::NotFound(note_id)),
            },
            None => {
                self.notes
                    .create_note(&content, category.as_deref())
                    .await
            }
        };
        let mut synced = Ok(());
        if result.is_ok() {
            self.cancel_edit();
            synced = self.sync_views().await;
        }
        self.record_synced(result, synced)
    }

    pub async fn delete(&mut self, note_id: NoteId) -> CoreResult<()> {
        let result = self.notes.delete_note(note_id).await;
        let mut synced = Ok(());
        if result.is_ok() {
            if self.editing == Some(note_id) {
                self.cancel_edit();
            }
            if self.expanded_history == Some(note_id) {
                self.expanded_history = None;
            }
            synced = self.sync_views().await;
        }
        self.record_synced(result, synced)
    }

    /// Expands the history panel of `note_id`, or collapses it when it is
    /// already expanded. Returns whether it is now expanded.
    pub fn toggle_history(&mut self, note_id: NoteId) -> bool {
        if self.expanded_history == Some(note_id) {
            self.expanded_history = None;
            false
        } else {
            self.expanded_history = Some(note_id);
            true
        }
    }

    pub fn history_panel(&self, note_id: NoteId) -> HistoryPanel {
        if self.expanded_history != Some(note_id) {
            return HistoryPanel::Collapsed;
        }
        match self.view.get(note_id) {
            Some(note) if !note.history.is_empty() => HistoryPanel::Entries(
                note.history
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| HistoryLine {
                        index,
                        content: entry.content.clone(),
                        modified_by: entry.modifier_email.clone(),
                        modified_at: format_timestamp(entry.timestamp),
                    })
                    .collect(),
            ),
            _ => HistoryPanel::Empty,
        }
    }

    /// Reverts `note_id` to the history entry at `index`.
    pub async fn revert(&mut self, note_id: NoteId, index: usize) -> CoreResult<()> {
        self.revert_succeeded = false;
        let result = match self.history_entry(note_id, index) {
            Ok(target) => self.notes.revert_note(note_id, &target).await.map(|_| ()),
            Err(err) => Err(err),
        };
        let mut synced = Ok(());
        if result.is_ok() {
            self.revert_succeeded = true;
            synced = self.sync_views().await;
        }
        self.record_synced(result, synced)
    }

    /// Whether the last revert succeeded; reset when the next edit begins.
    pub fn revert_succeeded(&self) -> bool {
        self.revert_succeeded
    }

    pub async fn add_category(&mut self, name: &str) -> CoreResult<DocId> {
        let result = self.registry.add_category(name).await;
        let mut synced = Ok(());
        if result.is_ok() {
            synced = self.sync_views().await;
        }
        self.record_synced(result, synced)
    }

    /// Distinct category names for pickers.
    pub fn category_names(&self) -> BTreeSet<String> {
        self.categories.names()
    }

    /// Applies pending change notifications to both views.
    pub async fn refresh(&mut self) -> CoreResult<()> {
        let result = self.sync_views().await;
        self.record(result)
    }

    /// Shows only notes in `category`; `None` or blank shows every note.
    pub async fn set_category_filter(&mut self, category: Option<&str>) -> CoreResult<()> {
        let result = self.view.set_category_filter(category).await;
        self.record(result)
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.view.category_filter()
    }

    /// Visible notes in store order.
    pub fn notes(&self) -> Vec<NoteSummary> {
        self.view.notes().map(NoteSummary::from_note).collect()
    }

    pub fn note(&self, note_id: NoteId) -> Option<&Note> {
        self.view.get(note_id)
    }

    pub fn last_error(&self) -> Option<&CoreError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Releases both live subscriptions.
    pub fn close(&mut self) {
        self.view.close();
        self.categories.close();
    }

    fn history_entry(&self, note_id: NoteId, index: usize) -> CoreResult<HistoryEntry> {
        let note = self.view.get(note_id).ok_or(CoreError::NotFound(note_id))?;
        note.history.get(index).cloned().ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "history index {index} out of range for {} entries",
                note.history.len()
            ))
        })
    }

    async fn sync_views(&mut self) -> CoreResult<()> {
        self.view.refresh().await?;
        self.categories.refresh().await?;
        Ok(())
    }

    /// Records a mutation outcome; a view failure after a committed
    /// mutation is kept without turning the mutation into an error.
    fn record_synced<T>(
        &mut self,
        result: CoreResult<T>,
        synced: CoreResult<()>,
    ) -> CoreResult<T> {
        self.last_error = match (&result, synced) {
            (Err(err), _) => Some(err.clone()),
            (Ok(_), Err(err)) => {
                warn!(
                    "event=board_sync module=board status=error error_code={}",
                    err.code()
                );
                Some(err)
            }
            (Ok(_), Ok(())) => None,
        };
        result
    }

    fn record<T>(&mut self, result: CoreResult<T>) -> CoreResult<T> {
        self.last_error = result.as_ref().err().cloned();
        result
    }
}
