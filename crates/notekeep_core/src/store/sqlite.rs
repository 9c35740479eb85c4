//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents as JSON bodies in the `documents` table.
//! - Keep logical commit time in `store_clock` so it survives reopen.
//! - Publish committed collection contents through the change feed.
//!
//! # Invariants
//! - Each write and its clock tick commit in one transaction; the tick is
//!   stamped into the body before it is stored.
//! - Snapshots list documents by insertion sequence.

use super::{
    stamp_commit_time, ChangeFeed, Collection, Commit, DocId, DocumentStore, Filter, StoreError,
    StoreResult, StoredDocument, Subscription,
};
use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::note::Timestamp;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(format!("sqlite error: {value}"))
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// `DocumentStore` persisted in one SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::new(),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    fn publish(&self, conn: &Connection, collection: Collection) {
        if !self.feed.has_subscribers(collection) {
            return;
        }
        match load_collection(conn, collection) {
            Ok(documents) => self.feed.publish(collection, &documents),
            Err(err) => {
                warn!(
                    "event=feed_publish module=store status=error backend=sqlite collection={collection} error={err}"
                );
                self.feed.fail_all(err);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: Collection, mut document: Value) -> StoreResult<Commit> {
        let id = Uuid::new_v4();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let committed_at = next_tick(&tx)?;
        stamp_commit_time(&mut document, committed_at);
        let body = encode_body(&document)?;
        tx.execute(
            "INSERT INTO documents (collection, id, body, committed_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![collection.as_str(), id.to_string(), body, committed_at],
        )?;
        tx.commit()?;

        self.publish(&conn, collection);
        debug!("event=doc_create module=store status=ok backend=sqlite collection={collection} id={id}");
        Ok(Commit { id, committed_at })
    }

    async fn replace(
        &self,
        collection: Collection,
        id: DocId,
        mut document: Value,
    ) -> StoreResult<Commit> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let committed_at = next_tick(&tx)?;
        stamp_commit_time(&mut document, committed_at);
        let body = encode_body(&document)?;
        let changed = tx.execute(
            "UPDATE documents
             SET body = ?3, committed_at = ?4
             WHERE collection = ?1
               AND id = ?2;",
            params![collection.as_str(), id.to_string(), body, committed_at],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        tx.commit()?;

        self.publish(&conn, collection);
        debug!("event=doc_replace module=store status=ok backend=sqlite collection={collection} id={id}");
        Ok(Commit { id, committed_at })
    }

    async fn delete(&self, collection: Collection, id: DocId) -> StoreResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
            params![collection.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { collection, id });
        }

        self.publish(&conn, collection);
        debug!("event=doc_delete module=store status=ok backend=sqlite collection={collection} id={id}");
        Ok(())
    }

    async fn get(&self, collection: Collection, id: DocId) -> StoreResult<Option<StoredDocument>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2;",
                params![collection.as_str(), id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(StoredDocument {
                id,
                data: decode_body(&body)?,
            })),
            None => Ok(None),
        }
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> StoreResult<Subscription> {
        let conn = self.lock()?;
        let documents = load_collection(&conn, collection)?;
        self.feed.register(collection, filter, &documents)
    }

    async fn now(&self) -> StoreResult<Timestamp> {
        let conn = self.lock()?;
        next_tick(&conn)
    }
}

/// Advances the persisted clock to `max(last + 1, wall_ms)`.
fn next_tick(conn: &Connection) -> StoreResult<Timestamp> {
    let tick = conn.query_row(
        "UPDATE store_clock
         SET last_tick = MAX(last_tick + 1, ?1)
         WHERE id = 1
         RETURNING last_tick;",
        [Utc::now().timestamp_millis()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(tick)
}

fn load_collection(conn: &Connection, collection: Collection) -> StoreResult<Vec<StoredDocument>> {
    let mut stmt = conn.prepare(
        "SELECT id, body
         FROM documents
         WHERE collection = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([collection.as_str()])?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let body: String = row.get("body")?;
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            StoreError::Unavailable(format!("invalid document id `{id_text}` in documents.id"))
        })?;
        documents.push(StoredDocument {
            id,
            data: decode_body(&body)?,
        });
    }
    Ok(documents)
}

fn encode_body(document: &Value) -> StoreResult<String> {
    serde_json::to_string(document)
        .map_err(|err| StoreError::Unavailable(format!("cannot encode document: {err}")))
}

fn decode_body(body: &str) -> StoreResult<Value> {
    serde_json::from_str(body)
        .map_err(|err| StoreError::Unavailable(format!("invalid document body: {err}")))
}
