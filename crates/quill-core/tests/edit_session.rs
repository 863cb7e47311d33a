//! Edit session behavior: debounce coalescing, in-flight save discipline,
//! rebind cancellation, and failure recovery. All timing runs on the paused
//! tokio clock, so sleeps are virtual and deterministic.

mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use quill_core::editor::EditSession;
use quill_core::store::NoteStore;
use quill_core::Note;
use support::MockRemote;

const DEBOUNCE: Duration = Duration::from_millis(200);

async fn bound_session(mock: &Arc<MockRemote>) -> (NoteStore, EditSession, Note) {
    let owner = MockRemote::user("a@x.com");
    let note = mock.seed_note(&owner.id, "Untitled Note", None);

    let store = NoteStore::new(Arc::clone(mock) as Arc<dyn quill_core::remote::RemoteService>, owner);
    store.load().await.unwrap();

    let session = EditSession::with_debounce(store.clone(), DEBOUNCE);
    session.bind(&note);
    (store, session, note)
}

#[tokio::test(start_paused = true)]
async fn edits_made_without_subscribers_are_visible_later() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note) = bound_session(&mock).await;

    // No receiver exists while the binding and edit happen.
    session.set_content("written before anyone watches");

    let rx = session.subscribe();
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.draft.unwrap().note_id, note.id);
    assert!(snapshot.dirty);
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_rapid_edits_into_one_save() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note) = bound_session(&mock).await;

    session.set_content("h");
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.set_content("he");
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.set_content("hello world");

    // Every edit restarted the window, so nothing has been saved yet.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(mock.update_call_count(), 0);
    assert!(session.snapshot().dirty);

    // Idle past the window: exactly one save with the final content.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock.update_call_count(), 1);
    let stored = mock.stored_note(note.id).unwrap();
    assert_eq!(stored.content.as_deref(), Some("hello world"));

    let snapshot = session.snapshot();
    assert!(!snapshot.dirty);
    assert!(!snapshot.saving);
}

#[tokio::test(start_paused = true)]
async fn successful_save_syncs_draft_and_clears_dirty() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note) = bound_session(&mock).await;

    session.set_title("Groceries");
    session.set_content("buy milk");
    assert!(session.snapshot().dirty);

    session.save().await.unwrap();

    let snapshot = session.snapshot();
    assert!(!snapshot.dirty);
    assert!(!snapshot.saving);
    let draft = snapshot.draft.unwrap();
    assert_eq!(draft.title, "Groceries");
    assert_eq!(draft.content.as_deref(), Some("buy milk"));

    let stored = mock.stored_note(note.id).unwrap();
    assert_eq!(stored.title, "Groceries");
    assert!(stored.updated_at >= stored.created_at);
}

#[tokio::test(start_paused = true)]
async fn manual_save_bypasses_the_idle_window() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, _note) = bound_session(&mock).await;

    session.set_title("Now");
    session.save().await.unwrap();
    assert_eq!(mock.update_call_count(), 1);

    // The armed sleeper finds a clean draft and does nothing.
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(mock.update_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn save_when_clean_is_a_no_op() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, _note) = bound_session(&mock).await;

    session.save().await.unwrap();
    assert_eq!(mock.update_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn edits_during_inflight_save_stay_dirty_and_trigger_a_followup() {
    let mock = Arc::new(MockRemote::new());
    mock.set_update_delay(Duration::from_millis(500));
    let (_store, session, note) = bound_session(&mock).await;

    session.set_content("one");
    tokio::time::sleep(Duration::from_millis(250)).await;

    // The debounced save is in flight now; a new edit lands meanwhile.
    assert!(session.snapshot().saving);
    session.set_content("two");
    let snapshot = session.snapshot();
    assert!(snapshot.saving);
    assert!(snapshot.dirty);

    // The mid-flight edit's own window expires while the save is still
    // running; the saving gate must hold it to a single in-flight save.
    tokio::time::sleep(Duration::from_millis(220)).await;
    assert_eq!(mock.update_call_count(), 1);

    // First save resolves with "one"; the draft re-evaluates dirty against
    // it and a fresh debounce saves "two".
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(mock.update_call_count(), 2);
    let stored = mock.stored_note(note.id).unwrap();
    assert_eq!(stored.content.as_deref(), Some("two"));

    let snapshot = session.snapshot();
    assert!(!snapshot.dirty);
    assert!(!snapshot.saving);
}

#[tokio::test(start_paused = true)]
async fn rebinding_cancels_the_pending_debounce() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note_a) = bound_session(&mock).await;
    let owner = MockRemote::user("a@x.com");
    let note_b = mock.seed_note(&owner.id, "Second", None);

    session.set_content("draft for a");
    session.bind(&note_b);

    tokio::time::sleep(DEBOUNCE * 3).await;
    assert_eq!(mock.update_call_count(), 0);
    assert_eq!(mock.stored_note(note_a.id).unwrap().content, None);

    let draft = session.snapshot().draft.unwrap();
    assert_eq!(draft.note_id, note_b.id);
}

#[tokio::test(start_paused = true)]
async fn binding_resets_the_draft_clean() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, _note) = bound_session(&mock).await;

    let snapshot = session.snapshot();
    assert!(!snapshot.dirty);
    assert!(!snapshot.saving);
    let draft = snapshot.draft.unwrap();
    assert_eq!(draft.title, "Untitled Note");
    assert_eq!(draft.content, None);
}

#[tokio::test(start_paused = true)]
async fn unbind_if_clears_only_the_matching_note() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note) = bound_session(&mock).await;
    let owner = MockRemote::user("a@x.com");
    let other = mock.seed_note(&owner.id, "Other", None);

    session.unbind_if(other.id);
    assert!(session.snapshot().draft.is_some());

    session.unbind_if(note.id);
    assert!(session.snapshot().draft.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_the_draft_dirty_without_auto_retry() {
    let mock = Arc::new(MockRemote::new());
    let (_store, session, note) = bound_session(&mock).await;

    mock.fail_next_update();
    session.set_content("precious edit");
    tokio::time::sleep(DEBOUNCE * 2).await;

    // One failed attempt; draft preserved, no timer restart.
    assert_eq!(mock.update_call_count(), 1);
    let snapshot = session.snapshot();
    assert!(snapshot.dirty);
    assert!(!snapshot.saving);
    assert_eq!(
        snapshot.draft.unwrap().content.as_deref(),
        Some("precious edit")
    );

    tokio::time::sleep(DEBOUNCE * 5).await;
    assert_eq!(mock.update_call_count(), 1);

    // An explicit save is the retry trigger.
    session.save().await.unwrap();
    assert_eq!(mock.update_call_count(), 2);
    assert!(!session.snapshot().dirty);
    assert_eq!(
        mock.stored_note(note.id).unwrap().content.as_deref(),
        Some("precious edit")
    );
}

#[tokio::test(start_paused = true)]
async fn stale_save_result_is_discarded_after_rebind() {
    let mock = Arc::new(MockRemote::new());
    mock.set_update_delay(Duration::from_millis(500));
    let (_store, session, _note_a) = bound_session(&mock).await;
    let owner = MockRemote::user("a@x.com");
    let note_b = mock.seed_note(&owner.id, "Second", None);

    session.set_content("for a");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(session.snapshot().saving);

    // Switch notes while the save is in flight. The save completes against
    // the store, but the session state it would have updated is gone.
    session.bind(&note_b);
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let snapshot = session.snapshot();
    let draft = snapshot.draft.unwrap();
    assert_eq!(draft.note_id, note_b.id);
    assert!(!snapshot.dirty);
    assert!(!snapshot.saving);
}
