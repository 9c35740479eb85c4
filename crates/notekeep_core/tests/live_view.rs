use notekeep_core::{
    Collection, CoreError, IdentityProvider, MemoryStore, NoteService, NoteView,
    ResubscribePolicy, UserIdentity,
};
use std::sync::Arc;
use std::time::Duration;

const ALICE: &str = "alice@example.com";

struct Fixture {
    store: Arc<MemoryStore>,
    _identity: IdentityProvider,
    service: NoteService<MemoryStore>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let identity = IdentityProvider::signed_in(UserIdentity::new("a", ALICE));
    let service = NoteService::new(Arc::clone(&store), identity.watch());
    Fixture {
        store,
        _identity: identity,
        service,
    }
}

fn contents<S: notekeep_core::DocumentStore + ?Sized>(view: &NoteView<S>) -> Vec<String> {
    view.notes().map(|note| note.content.clone()).collect()
}

#[tokio::test]
async fn open_loads_existing_notes_in_store_order() {
    let f = fixture();
    f.service.create_note("one", None).await.unwrap();
    f.service.create_note("two", Some("Work")).await.unwrap();

    let view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();

    assert_eq!(contents(&view), vec!["one", "two"]);
    assert_eq!(view.revision(), 1);
}

#[tokio::test]
async fn view_reflects_every_committed_mutation() {
    let f = fixture();
    let mut view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();
    assert!(view.is_empty());

    let id = f.service.create_note("draft", None).await.unwrap();
    assert!(view.refresh().await.unwrap());
    assert_eq!(contents(&view), vec!["draft"]);

    let last_known = view.get(id).unwrap().clone();
    f.service.update_note(&last_known, "final", None).await.unwrap();
    view.refresh().await.unwrap();
    assert_eq!(view.get(id).unwrap().content, "final");
    assert_eq!(view.get(id).unwrap().history.len(), 1);

    f.service.delete_note(id).await.unwrap();
    view.refresh().await.unwrap();
    assert!(view.get(id).is_none());

    assert!(!view.refresh().await.unwrap());
}

#[tokio::test]
async fn wait_for_change_wakes_on_commit_from_another_task() {
    let f = fixture();
    let mut view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.service.create_note("from elsewhere", None).await.unwrap();
        f
    });

    tokio::time::timeout(Duration::from_secs(5), view.wait_for_change())
        .await
        .expect("change should arrive")
        .unwrap();
    assert_eq!(contents(&view), vec!["from elsewhere"]);
    let _ = writer.await.unwrap();
}

#[tokio::test]
async fn category_filter_round_trip_restores_full_set() {
    let f = fixture();
    f.service.create_note("w1", Some("Work")).await.unwrap();
    f.service.create_note("h1", Some("Home")).await.unwrap();
    f.service.create_note("loose", None).await.unwrap();
    f.service.create_note("w2", Some("Work")).await.unwrap();

    let mut view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();
    let unfiltered = contents(&view);
    assert_eq!(unfiltered.len(), 4);

    view.set_category_filter(Some("Work")).await.unwrap();
    assert_eq!(view.category_filter(), Some("Work"));
    assert_eq!(contents(&view), vec!["w1", "w2"]);

    view.set_category_filter(Some("")).await.unwrap();
    assert_eq!(view.category_filter(), None);
    assert_eq!(contents(&view), unfiltered);

    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 1);
}

#[tokio::test]
async fn filtered_view_sees_notes_move_in_and_out() {
    let f = fixture();
    let id = f.service.create_note("movable", None).await.unwrap();
    let mut view = NoteView::open(
        Arc::clone(&f.store),
        Some("Work"),
        ResubscribePolicy::immediate(1),
    )
    .await
    .unwrap();
    assert!(view.is_empty());

    let note = f.service.get_note(id).await.unwrap().unwrap();
    let moved = f.service.update_note(&note, "movable", Some("Work")).await.unwrap();
    view.refresh().await.unwrap();
    assert_eq!(view.len(), 1);

    f.service.update_note(&moved, "movable", None).await.unwrap();
    view.refresh().await.unwrap();
    assert!(view.is_empty());
}

#[tokio::test]
async fn closing_or_dropping_the_view_releases_its_subscription() {
    let f = fixture();
    let mut first = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();
    let second = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(1))
        .await
        .unwrap();
    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 2);

    first.close();
    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 1);

    drop(second);
    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 0);
}

#[tokio::test]
async fn interrupted_stream_is_resubscribed_with_fresh_snapshot() {
    let f = fixture();
    let mut view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(3))
        .await
        .unwrap();

    f.store.interrupt_subscriptions();
    f.service.create_note("after outage", None).await.unwrap();

    view.refresh().await.unwrap();
    assert_eq!(contents(&view), vec!["after outage"]);
    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 1);
}

#[tokio::test]
async fn persistent_outage_surfaces_store_unavailable() {
    let f = fixture();
    let mut view = NoteView::open(Arc::clone(&f.store), None, ResubscribePolicy::immediate(2))
        .await
        .unwrap();

    f.store.set_unavailable(true);
    f.store.interrupt_subscriptions();

    let err = view.refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::StoreUnavailable(_)));
    assert_eq!(f.store.feed().subscriber_count(Collection::Notes), 0);

    f.store.set_unavailable(false);
    assert!(view.refresh().await.unwrap());
}
