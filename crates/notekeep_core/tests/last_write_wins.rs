use async_trait::async_trait;
use notekeep_core::store::{StoreResult, StoredDocument, Subscription};
use notekeep_core::{
    Collection, Commit, DocId, DocumentStore, Filter, HistoryEntry, IdentityProvider,
    LogicalClock, MemoryStore, NoteService, Timestamp, UserIdentity,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

#[tokio::test]
async fn concurrent_updates_from_same_base_keep_the_later_write() {
    let store = Arc::new(MemoryStore::with_clock(LogicalClock::manual(0)));
    let alice_identity = IdentityProvider::signed_in(UserIdentity::new("a", ALICE));
    let bob_identity = IdentityProvider::signed_in(UserIdentity::new("b", BOB));
    let alice = NoteService::new(Arc::clone(&store), alice_identity.watch());
    let bob = NoteService::new(Arc::clone(&store), bob_identity.watch());

    let id = alice.create_note("x", None).await.unwrap();
    let base = alice.get_note(id).await.unwrap().unwrap();
    let t0 = base.timestamp;

    // Both clients read `base` before either writes.
    alice.update_note(&base, "y", None).await.unwrap();
    bob.update_note(&base, "z", None).await.unwrap();

    let stored = alice.get_note(id).await.unwrap().unwrap();
    assert_eq!(stored.content, "z");
    assert_eq!(
        stored.history,
        vec![HistoryEntry {
            content: "x".to_string(),
            timestamp: t0,
            modifier_email: BOB.to_string(),
        }]
    );
    assert_eq!(stored.creator_email, ALICE);
}

#[tokio::test]
async fn sequential_updates_from_fresh_state_keep_every_version() {
    let store = Arc::new(MemoryStore::with_clock(LogicalClock::manual(0)));
    let identity = IdentityProvider::signed_in(UserIdentity::new("a", ALICE));
    let service = NoteService::new(Arc::clone(&store), identity.watch());

    let id = service.create_note("x", None).await.unwrap();
    let base = service.get_note(id).await.unwrap().unwrap();
    let after_y = service.update_note(&base, "y", None).await.unwrap();
    let after_z = service.update_note(&after_y, "z", None).await.unwrap();

    let contents: Vec<&str> = after_z
        .history
        .iter()
        .map(|entry| entry.content.as_str())
        .collect();
    assert_eq!(contents, vec!["x", "y"]);
    assert_eq!(service.get_note(id).await.unwrap().unwrap(), after_z);
}

/// Holds the first `replace` until the test releases it.
struct PausedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl PausedStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::with_clock(LogicalClock::manual(0)),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl DocumentStore for PausedStore {
    async fn create(&self, collection: Collection, document: Value) -> StoreResult<Commit> {
        self.inner.create(collection, document).await
    }

    async fn replace(
        &self,
        collection: Collection,
        id: DocId,
        document: Value,
    ) -> StoreResult<Commit> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.replace(collection, id, document).await
    }

    async fn delete(&self, collection: Collection, id: DocId) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }

    async fn get(&self, collection: Collection, id: DocId) -> StoreResult<Option<StoredDocument>> {
        self.inner.get(collection, id).await
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: Option<Filter>,
    ) -> StoreResult<Subscription> {
        self.inner.subscribe(collection, filter).await
    }

    async fn now(&self) -> StoreResult<Timestamp> {
        self.inner.now().await
    }
}

#[tokio::test]
async fn overlapping_updates_take_commit_order_timestamps() {
    let store = Arc::new(PausedStore::new());
    let alice_identity = IdentityProvider::signed_in(UserIdentity::new("a", ALICE));
    let bob_identity = IdentityProvider::signed_in(UserIdentity::new("b", BOB));
    let alice = NoteService::new(Arc::clone(&store), alice_identity.watch());
    let bob = NoteService::new(Arc::clone(&store), bob_identity.watch());

    let id = alice.create_note("x", None).await.unwrap();
    let base = alice.get_note(id).await.unwrap().unwrap();

    // Alice's write starts first but commits after Bob's.
    let slow = alice.update_note(&base, "from alice", None);
    let fast = async {
        store.entered.notified().await;
        let written = bob.update_note(&base, "from bob", None).await;
        store.release.notify_one();
        written
    };
    let (after_alice, after_bob) = tokio::join!(slow, fast);
    let after_alice = after_alice.unwrap();
    let after_bob = after_bob.unwrap();

    assert!(after_bob.timestamp > base.timestamp);
    assert!(after_alice.timestamp > after_bob.timestamp);

    let stored = alice.get_note(id).await.unwrap().unwrap();
    assert_eq!(stored.content, "from alice");
    assert_eq!(stored.timestamp, after_alice.timestamp);
    assert_eq!(stored, after_alice);
    assert!(stored.history_is_ordered());
}
