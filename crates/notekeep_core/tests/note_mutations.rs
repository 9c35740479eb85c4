use notekeep_core::{
    CoreError, DocumentStore, HistoryEntry, IdentityProvider, LogicalClock, MemoryStore,
    NoteService, UserIdentity,
};
use std::sync::Arc;

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";

fn service_as(store: &Arc<MemoryStore>, email: &str) -> (IdentityProvider, NoteService<MemoryStore>) {
    let identity = IdentityProvider::signed_in(UserIdentity::new(email, email));
    let service = NoteService::new(Arc::clone(store), identity.watch());
    (identity, service)
}

fn clocked_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_clock(LogicalClock::manual(1_000)))
}

#[tokio::test]
async fn create_stores_trimmed_content_with_empty_history() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("  hello  ", Some("Work")).await.unwrap();

    let note = service.get_note(id).await.unwrap().expect("note exists");
    assert_eq!(note.content, "hello");
    assert_eq!(note.creator_email, ALICE);
    assert_eq!(note.category.as_deref(), Some("Work"));
    assert_eq!(note.timestamp, 1_001);
    assert!(note.history.is_empty());
    assert!(note.last_modified().is_none());
}

#[tokio::test]
async fn create_without_category_is_uncategorized() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let blank = service.create_note("a", Some("   ")).await.unwrap();
    let none = service.create_note("b", None).await.unwrap();

    assert_eq!(service.get_note(blank).await.unwrap().unwrap().category, None);
    assert_eq!(service.get_note(none).await.unwrap().unwrap().category, None);
}

#[tokio::test]
async fn update_appends_exactly_one_entry_with_prior_state() {
    let store = clocked_store();
    let (_alice, alice) = service_as(&store, ALICE);
    let (_bob, bob) = service_as(&store, BOB);

    let id = alice.create_note("first", None).await.unwrap();
    let created = alice.get_note(id).await.unwrap().unwrap();

    let updated = bob.update_note(&created, "second", Some("Ideas")).await.unwrap();

    assert_eq!(updated.content, "second");
    assert_eq!(updated.category.as_deref(), Some("Ideas"));
    assert_eq!(updated.creator_email, ALICE);
    assert!(updated.timestamp > created.timestamp);
    assert_eq!(
        updated.history,
        vec![HistoryEntry {
            content: "first".to_string(),
            timestamp: created.timestamp,
            modifier_email: BOB.to_string(),
        }]
    );
    assert_eq!(updated.last_modified(), Some((BOB, created.timestamp)));
    assert_eq!(alice.get_note(id).await.unwrap().unwrap(), updated);
}

#[tokio::test]
async fn update_with_identical_content_still_records_history() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("same", None).await.unwrap();
    let created = service.get_note(id).await.unwrap().unwrap();
    let updated = service.update_note(&created, "same", None).await.unwrap();

    assert_eq!(updated.content, "same");
    assert_eq!(updated.history.len(), 1);
    assert_eq!(updated.history[0].content, "same");
}

#[tokio::test]
async fn update_of_deleted_note_reports_not_found() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("gone soon", None).await.unwrap();
    let last_known = service.get_note(id).await.unwrap().unwrap();
    service.delete_note(id).await.unwrap();

    let err = service
        .update_note(&last_known, "too late", None)
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound(id));
}

#[tokio::test]
async fn revert_restores_target_content_and_keeps_all_entries() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("v1", Some("Work")).await.unwrap();
    let n1 = service.get_note(id).await.unwrap().unwrap();
    let n2 = service.update_note(&n1, "v2", Some("Work")).await.unwrap();
    let n3 = service.update_note(&n2, "v3", Some("Work")).await.unwrap();
    let target = n3.history[0].clone();

    let reverted = service.revert_note(id, &target).await.unwrap();

    assert_eq!(reverted.content, "v1");
    assert_eq!(reverted.category.as_deref(), Some("Work"));
    assert_eq!(reverted.creator_email, ALICE);
    assert_eq!(reverted.history.len(), 3);
    assert_eq!(reverted.history[..2], n3.history[..]);
    assert_eq!(reverted.history[2].content, "v3");
    assert_eq!(reverted.history[2].timestamp, n3.timestamp);
    assert!(reverted.history_is_ordered());
}

#[tokio::test]
async fn revert_to_current_content_still_appends() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("x", None).await.unwrap();
    let created = service.get_note(id).await.unwrap().unwrap();
    let updated = service.update_note(&created, "x", None).await.unwrap();

    let reverted = service
        .revert_note(id, &updated.history[0])
        .await
        .unwrap();

    assert_eq!(reverted.content, "x");
    assert_eq!(reverted.history.len(), 2);
}

#[tokio::test]
async fn revert_rejects_entry_not_in_history() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("only", None).await.unwrap();
    let foreign = HistoryEntry {
        content: "never existed".to_string(),
        timestamp: 1,
        modifier_email: BOB.to_string(),
    };

    let err = service.revert_note(id, &foreign).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
    assert_eq!(store.calls().replaces(), 0);
}

#[tokio::test]
async fn revert_of_missing_note_reports_not_found() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);
    let id = service.create_note("temp", None).await.unwrap();
    let created = service.get_note(id).await.unwrap().unwrap();
    let updated = service.update_note(&created, "temp2", None).await.unwrap();
    service.delete_note(id).await.unwrap();

    let err = service
        .revert_note(id, &updated.history[0])
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::NotFound(id));
}

#[tokio::test]
async fn delete_removes_note_and_second_delete_is_not_found() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);

    let id = service.create_note("bye", None).await.unwrap();
    service.delete_note(id).await.unwrap();

    assert!(service.get_note(id).await.unwrap().is_none());
    assert_eq!(store.document_count(notekeep_core::Collection::Notes), 0);
    assert_eq!(
        service.delete_note(id).await.unwrap_err(),
        CoreError::NotFound(id)
    );
}

#[tokio::test]
async fn store_outage_surfaces_as_store_unavailable() {
    let store = clocked_store();
    let (_identity, service) = service_as(&store, ALICE);
    store.set_unavailable(true);

    let err = service.create_note("offline", None).await.unwrap_err();
    assert!(matches!(err, CoreError::StoreUnavailable(_)));

    store.set_unavailable(false);
    let id = service.create_note("online", None).await.unwrap();
    assert!(store.get(notekeep_core::Collection::Notes, id).await.unwrap().is_some());
}
