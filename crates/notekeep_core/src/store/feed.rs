//! Change notification registry shared by store adapters.
//!
//! # Responsibility
//! - Track live subscriptions per collection and filter.
//! - Push full matching snapshots to every subscriber after a commit.
//!
//! # Invariants
//! - Each subscription has exactly one consumer.
//! - Delivery is latest-value: an unread snapshot is replaced, never queued.
//! - A subscription is unregistered on `close()` or drop, whichever is first.

use super::{Batch, Collection, Filter, StoreError, StoreResult, StoredDocument};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

/// Outcome of a non-blocking poll on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A snapshot (or a subscription failure) is ready.
    Batch(Batch),
    /// Nothing new since the last read.
    Pending,
    /// The store dropped this subscription.
    Closed,
}

struct Subscriber {
    collection: Collection,
    filter: Option<Filter>,
    sender: watch::Sender<Batch>,
}

#[derive(Default)]
struct FeedRegistry {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

/// Subscriber registry owned by one store instance.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    registry: Arc<Mutex<FeedRegistry>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber primed with the current collection contents.
    pub fn register(
        &self,
        collection: Collection,
        filter: Option<Filter>,
        documents: &[StoredDocument],
    ) -> StoreResult<Subscription> {
        let initial = filter_documents(documents, filter.as_ref());
        let (sender, mut receiver) = watch::channel(Ok(initial));
        receiver.mark_changed();

        let mut registry = self
            .registry
            .lock()
            .map_err(|_| StoreError::Unavailable("change feed lock poisoned".to_string()))?;
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(
            id,
            Subscriber {
                collection,
                filter,
                sender,
            },
        );
        debug!(
            "event=subscription_open module=store status=ok collection={} subscription_id={} live={}",
            collection,
            id,
            registry.subscribers.len()
        );

        Ok(Subscription {
            id,
            collection,
            receiver,
            registry: Arc::downgrade(&self.registry),
            released: false,
        })
    }

    /// Returns whether any live subscriber watches `collection`.
    pub fn has_subscribers(&self, collection: Collection) -> bool {
        self.subscriber_count(collection) > 0
    }

    /// Returns the number of live subscribers on `collection`.
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.registry.lock().map_or(0, |registry| {
            registry
                .subscribers
                .values()
                .filter(|subscriber| subscriber.collection == collection)
                .count()
        })
    }

    /// Pushes the committed contents of `collection` to its subscribers.
    ///
    /// `documents` is the whole collection; each subscriber receives the
    /// subset matching its own filter.
    pub fn publish(&self, collection: Collection, documents: &[StoredDocument]) {
        let Ok(mut registry) = self.registry.lock() else {
            return;
        };
        registry
            .subscribers
            .retain(|_, subscriber| !subscriber.sender.is_closed());
        for subscriber in registry.subscribers.values() {
            if subscriber.collection != collection {
                continue;
            }
            let snapshot = filter_documents(documents, subscriber.filter.as_ref());
            subscriber.sender.send_replace(Ok(snapshot));
        }
    }

    /// Delivers `error` to every subscriber. Subscriptions stay registered.
    pub fn fail_all(&self, error: StoreError) {
        let Ok(registry) = self.registry.lock() else {
            return;
        };
        for subscriber in registry.subscribers.values() {
            subscriber.sender.send_replace(Err(error.clone()));
        }
    }

    /// Drops every subscriber; their streams end.
    pub fn disconnect_all(&self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.subscribers.clear();
        }
    }
}

/// Owned handle on one live subscription.
///
/// The first read yields the matching set as of `subscribe`; later reads
/// yield the newest committed snapshot.
pub struct Subscription {
    id: u64,
    collection: Collection,
    receiver: watch::Receiver<Batch>,
    registry: Weak<Mutex<FeedRegistry>>,
    released: bool,
}

impl Subscription {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the store has dropped this subscription.
    pub async fn next(&mut self) -> Option<Batch> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Returns the next snapshot if one is ready, without waiting.
    pub fn try_next(&mut self) -> Delivery {
        match self.receiver.has_changed() {
            Ok(true) => Delivery::Batch(self.receiver.borrow_and_update().clone()),
            Ok(false) => Delivery::Pending,
            Err(_) => Delivery::Closed,
        }
    }

    /// Stops further notifications and unregisters from the store.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = registry.lock() else {
            return;
        };
        registry.subscribers.remove(&self.id);
        debug!(
            "event=subscription_close module=store status=ok collection={} subscription_id={} live={}",
            self.collection,
            self.id,
            registry.subscribers.len()
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

fn filter_documents(documents: &[StoredDocument], filter: Option<&Filter>) -> Vec<StoredDocument> {
    documents
        .iter()
        .filter(|document| filter.map_or(true, |filter| filter.matches(&document.data)))
        .cloned()
        .collect()
}
