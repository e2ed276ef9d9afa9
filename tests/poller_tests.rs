//! Client poller integration tests against a live listener.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use palaver::message::MessageWithAuthor;
use palaver::poller::{ChatClient, ClientError, MessageView, Poller, PollerConfig, PollerState};

mod common;
use common::{seed_user, test_backend};

/// Poll interval used by these tests; short so a "next tick" is cheap to
/// wait for.
const TEST_INTERVAL: Duration = Duration::from_millis(50);

/// View that records every snapshot the poller pushes.
#[derive(Default)]
struct RecordingView {
    snapshots: Mutex<Vec<Vec<MessageWithAuthor>>>,
    errors: Mutex<Vec<String>>,
    expired: AtomicBool,
}

impl RecordingView {
    fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    fn latest(&self) -> Option<Vec<MessageWithAuthor>> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    fn latest_bodies(&self) -> Vec<String> {
        self.latest()
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.body)
            .collect()
    }

    fn expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }
}

impl MessageView for RecordingView {
    fn replace_all(&self, messages: Vec<MessageWithAuthor>) {
        self.snapshots.lock().unwrap().push(messages);
    }

    fn transient_error(&self, context: &str, error: &ClientError) {
        self.errors
            .lock()
            .unwrap()
            .push(format!("{context}: {error}"));
    }

    fn session_expired(&self) {
        self.expired.store(true, Ordering::Release);
    }
}

/// Serve the router on an ephemeral port and return its base URL.
async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Wait for a condition with a deadline, polling frequently.
async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn poller_for(client: ChatClient, view: Arc<RecordingView>) -> Poller {
    Poller::new(
        client,
        view,
        PollerConfig {
            interval: TEST_INTERVAL,
        },
    )
}

#[tokio::test]
async fn test_initial_cycle_populates_view_and_cursor() {
    let backend = test_backend().await;
    let (ada_id, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;
    backend
        .state
        .messages
        .create_message(&ada_id, "welcome aboard")
        .await
        .unwrap();

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());

    assert_eq!(poller.state(), PollerState::Idle);
    poller.start();

    // The first cycle runs immediately: no cursor yet means epoch, which
    // always trails the watermark.
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;
    assert_eq!(view.latest_bodies(), vec!["welcome aboard".to_string()]);
    assert!(poller.cursor().await.is_some());

    poller.stop().await;
    assert_eq!(poller.state(), PollerState::Stopped);
}

#[tokio::test]
async fn test_no_change_ticks_leave_cursor_and_view() {
    let backend = test_backend().await;
    let (_, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();

    wait_for("initial refresh", || view.snapshot_count() >= 1).await;
    let cursor = poller.cursor().await;

    // Several idle ticks: no new snapshots, cursor untouched.
    tokio::time::sleep(TEST_INTERVAL * 5).await;
    assert_eq!(view.snapshot_count(), 1);
    assert_eq!(poller.cursor().await, cursor);

    poller.stop().await;
}

#[tokio::test]
async fn test_other_clients_write_observed_on_next_tick() {
    let backend = test_backend().await;
    let (_, ada_token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;
    let (grace_id, _) = seed_user(&backend.state, "grace", "Grace", "Hopper").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &ada_token), view.clone());
    poller.start();

    wait_for("initial refresh", || view.snapshot_count() >= 1).await;

    // Another client writes; this poller only sees it after its next
    // tick, bounded by the poll interval.
    let message = backend
        .state
        .messages
        .create_message(&grace_id, "news from grace")
        .await
        .unwrap();

    wait_for("change picked up", || {
        view.latest_bodies().contains(&"news from grace".to_string())
    })
    .await;

    // Grace deletes her message; this poller's view catches up on a
    // later tick, bounded by the interval.
    backend
        .state
        .messages
        .delete_message(message.id, &grace_id)
        .await
        .unwrap();

    wait_for("deletion picked up", || view.latest_bodies().is_empty()).await;

    poller.stop().await;
}

#[tokio::test]
async fn test_read_your_writes_on_send() {
    let backend = test_backend().await;
    let (_, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;

    // The send bypasses the timer: once it returns, the view already
    // reflects the write.
    let message = poller.send_message("my own words").await.unwrap();
    assert_eq!(message.body, "my own words");
    assert!(view.latest_bodies().contains(&"my own words".to_string()));

    poller.stop().await;
}

#[tokio::test]
async fn test_edit_and_delete_refresh_immediately() {
    let backend = test_backend().await;
    let (_, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;

    let message = poller.send_message("draft wording").await.unwrap();

    let edited = poller.edit_message(message.id, "final wording").await.unwrap();
    assert_eq!(edited.body, "final wording");
    assert_eq!(view.latest_bodies(), vec!["final wording".to_string()]);

    poller.delete_message(message.id).await.unwrap();
    assert!(view.latest_bodies().is_empty());

    poller.stop().await;
}

#[tokio::test]
async fn test_rejected_send_propagates_and_skips_refresh() {
    let backend = test_backend().await;
    let (_, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;
    let snapshots_before = view.snapshot_count();

    // Validation failures are surfaced to the caller, not swallowed into
    // the polling cycle, and trigger no refresh.
    let err = poller.send_message("   ").await.unwrap_err();
    match err {
        ClientError::Rejected { status, .. } => assert_eq!(status.as_u16(), 400),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(view.snapshot_count(), snapshots_before);

    poller.stop().await;
}

#[tokio::test]
async fn test_search_is_one_shot_and_leaves_cursor() {
    let backend = test_backend().await;
    let (ada_id, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;
    backend
        .state
        .messages
        .create_message(&ada_id, "Hello world")
        .await
        .unwrap();
    backend
        .state
        .messages
        .create_message(&ada_id, "unrelated chatter")
        .await
        .unwrap();

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;
    let cursor = poller.cursor().await;

    // Search replaces the view but never touches the cursor.
    poller.search("hello").await.unwrap();
    assert_eq!(view.latest_bodies(), vec!["Hello world".to_string()]);
    assert_eq!(poller.cursor().await, cursor);

    // No matches render as an empty set; the cursor still holds.
    poller.search("absent").await.unwrap();
    assert!(view.latest_bodies().is_empty());
    assert_eq!(poller.cursor().await, cursor);

    // Returning to the room is an explicit full refresh, which does
    // advance the cursor.
    poller.show_all().await;
    assert_eq!(view.latest_bodies().len(), 2);
    assert!(poller.cursor().await > cursor);

    poller.stop().await;
}

#[tokio::test]
async fn test_session_expiry_is_a_hard_exit() {
    let backend = test_backend().await;
    seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(
        ChatClient::with_token(&base_url, "not-a-valid-token"),
        view.clone(),
    );
    poller.start();

    wait_for("session expiry", || view.expired()).await;
    assert_eq!(poller.state(), PollerState::Stopped);

    // No snapshots ever landed, and no further cycles run.
    let count = view.snapshot_count();
    tokio::time::sleep(TEST_INTERVAL * 3).await;
    assert_eq!(view.snapshot_count(), count);

    poller.stop().await;
}

#[tokio::test]
async fn test_stop_halts_cycles_for_good() {
    let backend = test_backend().await;
    let (ada_id, token) = seed_user(&backend.state, "ada", "Ada", "Lovelace").await;

    let base_url = spawn_server(backend.router).await;
    let view = Arc::new(RecordingView::default());
    let mut poller = poller_for(ChatClient::with_token(&base_url, &token), view.clone());
    poller.start();
    wait_for("initial refresh", || view.snapshot_count() >= 1).await;

    poller.stop().await;
    assert_eq!(poller.state(), PollerState::Stopped);
    let count = view.snapshot_count();

    // A write after stop is never observed: there is no resume from
    // Stopped, and start() on a stopped poller is a no-op.
    backend
        .state
        .messages
        .create_message(&ada_id, "after the end")
        .await
        .unwrap();
    poller.start();
    tokio::time::sleep(TEST_INTERVAL * 3).await;

    assert_eq!(view.snapshot_count(), count);
    assert_eq!(poller.state(), PollerState::Stopped);
}
