//! Live note view.
//!
//! # Responsibility
//! - Keep an in-memory `NoteId -> Note` projection in step with the store.
//! - Narrow the projection to one category on request.
//!
//! # Invariants
//! - Each delivered batch replaces the whole projection; nothing is patched.
//! - At most one subscription is held; switching the filter releases the
//!   old one before opening the new one.
//! - The subscription is released when the view is closed or dropped.

use crate::config::ResubscribePolicy;
use crate::error::CoreResult;
use crate::model::note::{Note, NoteId};
use crate::service::note_service::normalize_category;
use crate::store::{Collection, DocumentStore, Filter, StoredDocument};
use crate::sync::live_query::LiveQuery;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Continuously synchronized projection of the `notes` collection.
pub struct NoteView<S: DocumentStore + ?Sized> {
    query: LiveQuery<S>,
    category: Option<String>,
    notes: BTreeMap<NoteId, Note>,
    order: Vec<NoteId>,
    revision: u64,
}

impl<S: DocumentStore + ?Sized> NoteView<S> {
    /// Opens a view and loads the initial matching set.
    ///
    /// `None` or a blank `category` shows every note.
    pub async fn open(
        store: Arc<S>,
        category: Option<&str>,
        policy: ResubscribePolicy,
    ) -> CoreResult<Self> {
        let category = normalize_category(category);
        let query =
            LiveQuery::open(store, Collection::Notes, category_filter(&category), policy).await?;
        let mut view = Self {
            query,
            category,
            notes: BTreeMap::new(),
            order: Vec::new(),
            revision: 0,
        };
        view.refresh().await?;
        Ok(view)
    }

    /// Applies the newest delivered batch, if any, without waiting.
    ///
    /// Returns whether the projection was replaced.
    pub async fn refresh(&mut self) -> CoreResult<bool> {
        match self.query.poll_snapshot().await? {
            Some(documents) => {
                self.replace_all(documents);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits for the next committed change and applies it.
    pub async fn wait_for_change(&mut self) -> CoreResult<()> {
        let documents = self.query.next_snapshot().await?;
        self.replace_all(documents);
        Ok(())
    }

    /// Switches the category filter; `None` or blank shows every note.
    ///
    /// The projection is emptied first so notes from the previous filter
    /// are never shown under the new one.
    pub async fn set_category_filter(&mut self, category: Option<&str>) -> CoreResult<()> {
        let category = normalize_category(category);
        if category == self.category && self.query.is_live() {
            return Ok(());
        }

        self.notes.clear();
        self.order.clear();
        self.category = category;
        self.query.retarget(category_filter(&self.category)).await?;
        self.refresh().await?;
        Ok(())
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn get(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.get(&note_id)
    }

    /// Notes in store order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.order.iter().filter_map(|id| self.notes.get(id))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Number of batches applied since the view opened.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Releases the subscription. Later `refresh` calls resubscribe.
    pub fn close(&mut self) {
        self.query.close();
    }

    fn replace_all(&mut self, documents: Vec<StoredDocument>) {
        let mut notes = BTreeMap::new();
        let mut order = Vec::with_capacity(documents.len());
        for stored in &documents {
            match Note::from_stored(stored) {
                Ok(note) => {
                    order.push(note.id);
                    notes.insert(note.id, note);
                }
                Err(err) => warn!(
                    "event=note_view_decode module=sync status=skipped note_id={} error={}",
                    stored.id, err
                ),
            }
        }
        self.notes = notes;
        self.order = order;
        self.revision += 1;
        debug!(
            "event=note_view_apply module=sync status=ok notes={} revision={}",
            self.notes.len(),
            self.revision
        );
    }
}

fn category_filter(category: &Option<String>) -> Option<Filter> {
    category
        .as_ref()
        .map(|name| Filter::equals("category", name.as_str()))
}
