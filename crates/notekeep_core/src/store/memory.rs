//! In-process document store.
//!
//! # Responsibility
//! - Provide a complete `DocumentStore` without external services.
//! - Count store calls and inject transport failures for callers' tests.
//!
//! # Invariants
//! - Snapshots list documents in creation order.
//! - Every call is counted, including calls that fail.
//! - Writes tick the clock while holding the state lock, so commit times
//!   follow commit order.

use super::{
    stamp_commit_time, ChangeFeed, Collection, Commit, DocId, DocumentStore, Filter, LogicalClock,
    StoreError, StoreResult, StoredDocument, Subscription,
};
use crate::model::note::Timestamp;
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct StoreCalls {
    creates: AtomicUsize,
    replaces: AtomicUsize,
    deletes: AtomicUsize,
    reads: AtomicUsize,
    subscribes: AtomicUsize,
    clock_reads: AtomicUsize,
}

impl StoreCalls {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn clock_reads(&self) -> usize {
        self.clock_reads.load(Ordering::SeqCst)
    }

    /// Number of write calls (`create`, `replace`, `delete`).
    pub fn mutations(&self) -> usize {
        self.creates() + self.replaces() + self.deletes()
    }

    /// Number of calls of any kind.
    pub fn total(&self) -> usize {
        self.mutations() + self.reads() + self.subscribes() + self.clock_reads()
    }
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    data: Value,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: u64,
    collections: BTreeMap<Collection, BTreeMap<DocId, Entry>>,
}

impl MemoryState {
    fn snapshot(&self, collection: Collection) -> Vec<StoredDocument> {
        let Some(documents) = self.collections.get(&collection) else {
            return Vec::new();
        };
        let mut ordered: Vec<(&DocId, &Entry)> = documents.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.seq);
        ordered
            .into_iter()
            .map(|(id, entry)| StoredDocument {
                id: *id,
                data: entry.data.clone(),
            })
            .collect()
    }
}

/// `DocumentStore` kept entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    clock: LogicalClock,
    feed: ChangeFeed,
    calls: StoreCalls,
    unavailable: AtomicBool,
    subscriptions_unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store using the given commit clock.
    pub fn with_clock(clock: LogicalClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &StoreCalls {
        &self.calls
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes `subscribe` fail while writes and reads keep working.
    pub fn set_subscriptions_unavailable(&self, unavailable: bool) {
        self.subscriptions_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    /// Simulates a dropped notification transport on every subscription.
    pub fn interrupt_subscriptions(&self) {
        self.feed
            .fail_all(StoreError::Unavailable("notification stream interrupted".to_string()));
    }

    /// Number of documents currently held in `collection`.
    pub fn document_count(&self, collection: Collection) -> usize {
        self.state.lock().map_or(0, |state| {
            state
                .collections
                .get(&collection)
                .map_or(0, BTreeMap::len)
        })
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_state(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn commit(&self, state: &MemoryState, collection: Collection) {
        if self.feed.has_subscribers(collection) {
            self.feed.publish(collection, &state.snapshot(collection));
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: Collection, mut document: Value) -> StoreResult<Commit> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let mut state = self.lock_state()?;
        let committed_at = self.clock.tick();
        stamp_commit_time(&mut document, committed_at);
        let id = Uuid::new_v4();
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .collections
            .entry(collection)
            .or_default()
            .insert(id, Entry { seq, data: document });
        self.commit(&state, collection);
        debug!("event=doc_create module=store status=ok backend=memory collection={collection} id={id}");
        Ok(Commit { id, committed_at })
    }

    async fn replace(
        &self,
        collection: Collection,
        id: DocId,
        mut document: Value,
    ) -> StoreResult<Commit> {
        self.calls.replaces.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let mut state = self.lock_state()?;
        let entry = state
            .collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(&id))
            .ok_or(StoreError::NotFound { collection, id })?;
        let committed_at = self.clock.tick();
        stamp_commit_time(&mut document, committed_at);
        entry.data = document;
        self.commit(&state, collection);
        debug!("event=doc_replace module=store status=ok backend=memory collection={collection} id={id}");
        Ok(Commit { id, committed_at })
    }

    async fn delete(&self, collection: Collection, id: DocId) -> StoreResult<()> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let mut state = self.lock_state()?;
        let removed = state
            .collections
            .get_mut(&collection)
            .and_then(|documents| documents.remove(&id));
        if removed.is_none() {
            return Err(StoreError::NotFound { collection, id });
        }
        self.commit(&state, collection);
        debug!("event=doc_delete module=store status=ok backend=memory collection={collection} id={id}");
        Ok(())
    }

    async fn get(&self, collection: Collection, id: DocId) -> StoreResult<Option<StoredDocument>> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let state = self.lock_state()?;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|documents| documents.get(&id))
            .map(|entry| StoredDocument {
                id,
                data: entry.data.clone(),
            }))
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> StoreResult<Subscription> {
        self.calls.subscribes.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        if self.subscriptions_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "notification transport is down".to_string(),
            ));
        }

        let state = self.lock_state()?;
        self.feed
            .register(collection, filter, &state.snapshot(collection))
    }

    async fn now(&self) -> StoreResult<Timestamp> {
        self.calls.clock_reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self.clock.tick())
    }
}
