use chrono::{Duration, Utc};
use shared::{
    domain::TimerStatus,
    timer::{derive, TimerBoard},
};
use storage::Storage;

#[tokio::test]
async fn create_start_reset_delete_lifecycle() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let alice = storage.create_annotator("Alice").await.expect("alice");
    let listed = storage.list_annotators().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Alice");
    assert!(listed[0].start_time.is_none());

    let now = Utc::now();
    let started = storage
        .set_start_time(alice.id, Some(now))
        .await
        .expect("start")
        .expect("exists");
    let state = derive(&started, now + Duration::seconds(1));
    assert_eq!(state.status, TimerStatus::OnTime);
    assert_eq!(state.remaining_time, "23:59:59");

    let reset = storage
        .set_start_time(alice.id, None)
        .await
        .expect("reset")
        .expect("exists");
    assert_eq!(derive(&reset, Utc::now()).status, TimerStatus::Available);

    assert!(storage.delete_annotator(alice.id).await.expect("delete"));
    assert!(!storage.delete_annotator(alice.id).await.expect("delete again"));
}

#[tokio::test]
async fn board_snapshot_is_independent_of_later_writes() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let alice = storage.create_annotator("Alice").await.expect("alice");
    let started_at = Utc::now() - Duration::hours(25);
    storage
        .set_start_time(alice.id, Some(started_at))
        .await
        .expect("start")
        .expect("exists");

    let board = TimerBoard::new(storage.list_annotators().await.expect("list"));
    storage
        .set_start_time(alice.id, None)
        .await
        .expect("reset")
        .expect("exists");

    let view = board.view_at(Utc::now());
    assert_eq!(view[0].status, TimerStatus::Late);
    assert_eq!(view[0].remaining_time, "00:00:00");

    let fresh = TimerBoard::new(storage.list_annotators().await.expect("list"));
    assert_eq!(fresh.view_at(Utc::now())[0].status, TimerStatus::Available);
}
