//! Document store contract and adapters.
//!
//! # Responsibility
//! - Define the transactional key-document store the core mutates.
//! - Provide change notification as owned, scoped subscriptions.
//! - Host the in-memory and SQLite-backed adapters.
//!
//! # Invariants
//! - Every `create`/`replace`/`delete` is applied as one whole-document
//!   write; readers never observe partial documents.
//! - Subscribers receive the full matching set after every committed change.
//! - `now()` never returns the same value twice for one store.
//! - Commit times follow commit order: a later write never carries an
//!   earlier `COMMIT_TIME_FIELD` than one committed before it.

use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

mod clock;
mod feed;
pub mod memory;
pub mod sqlite;

pub use clock::LogicalClock;
pub use feed::{ChangeFeed, Delivery, Subscription};
pub use memory::{MemoryStore, StoreCalls};
pub use sqlite::SqliteStore;

use crate::model::note::Timestamp;

/// Store-assigned document key.
pub type DocId = Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Snapshot batch delivered to subscribers.
pub type Batch = StoreResult<Vec<StoredDocument>>;

/// Collections known by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Notes,
    Categories,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Categories => "categories",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter on one top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: value.into(),
        }
    }

    /// Returns whether the document carries `field == equals`.
    ///
    /// A missing field never matches.
    pub fn matches(&self, document: &Value) -> bool {
        document.get(self.field.as_str()) == Some(&self.equals)
    }
}

/// One document with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocId,
    pub data: Value,
}

/// Top-level field every written document object carries its commit time in.
pub const COMMIT_TIME_FIELD: &str = "timestamp";

/// Outcome of one committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub id: DocId,
    /// Logical time taken inside the write; also stamped into the body.
    pub committed_at: Timestamp,
}

/// Writes `committed_at` into the document's commit-time field.
///
/// Non-object documents are stored unchanged.
pub(crate) fn stamp_commit_time(document: &mut Value, committed_at: Timestamp) {
    if let Value::Object(fields) = document {
        fields.insert(COMMIT_TIME_FIELD.to_string(), Value::from(committed_at));
    }
}

/// Store-layer failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Target document is absent at write/read time.
    NotFound { collection: Collection, id: DocId },
    /// Transport, timeout or backend failure.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, id } => {
                write!(f, "document not found: {collection}/{id}")
            }
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Transactional key-document store with change notification.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persists a new document under a store-assigned key.
    ///
    /// The commit time is taken inside the write and stamped into
    /// `COMMIT_TIME_FIELD`.
    async fn create(&self, collection: Collection, document: Value) -> StoreResult<Commit>;
    /// Replaces a whole document, stamping the commit time like `create`.
    /// Fails with `NotFound` when absent.
    async fn replace(
        &self,
        collection: Collection,
        id: DocId,
        document: Value,
    ) -> StoreResult<Commit>;
    /// Removes a document. Fails with `NotFound` when absent.
    async fn delete(&self, collection: Collection, id: DocId) -> StoreResult<()>;
    /// Reads the authoritative current state of one document.
    async fn get(&self, collection: Collection, id: DocId) -> StoreResult<Option<StoredDocument>>;
    /// Opens a live subscription on the (optionally filtered) collection.
    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> StoreResult<Subscription>;
    /// Returns the store's logical commit time.
    async fn now(&self) -> StoreResult<Timestamp>;
}
