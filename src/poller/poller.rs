//! The client polling state machine.
//!
//! One cooperative timer drives the cycle: check whether the message set
//! changed since the held cursor, and if so re-fetch the whole set and
//! replace the view. The cursor is stamped at local refetch-completion
//! time, not at the server's reported check time: a write landing during
//! the refetch window leaves the server watermark ahead of the new
//! cursor, so the next cycle catches it. Eventually consistent, not
//! linearizable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::message::{Message, MessageWithAuthor};

use super::client::{ChatClient, ClientError};

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Prevent accidental zero/near-zero intervals from creating a busy-loop.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where poller output lands: the displayed message set and the two
/// notifications the protocol produces.
pub trait MessageView: Send + Sync + 'static {
    /// Replace the entire displayed message set. Full refetches and
    /// search results both land here; any transient per-message UI state
    /// is discarded.
    fn replace_all(&self, messages: Vec<MessageWithAuthor>);

    /// A check or refetch failed transiently; the cycle retries on the
    /// next tick.
    fn transient_error(&self, context: &str, error: &ClientError);

    /// The session is no longer authenticated. The poller has already
    /// stopped; the view should leave the chat context.
    fn session_expired(&self);
}

/// Poller lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollerState {
    /// Constructed, not started.
    Idle = 0,
    /// Timer armed, waiting for the next tick.
    Polling = 1,
    /// Asking the server whether anything changed.
    Checking = 2,
    /// Re-fetching the full message set.
    Refreshing = 3,
    /// Torn down; a stopped poller cannot be restarted.
    Stopped = 4,
}

impl PollerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Polling,
            2 => Self::Checking,
            3 => Self::Refreshing,
            _ => Self::Stopped,
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between poll cycles.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

struct Shared {
    client: ChatClient,
    view: Arc<dyn MessageView>,
    /// The cursor, stamped at local refetch-completion time. The lock
    /// doubles as the in-flight guard: timer cycles and bypass refreshes
    /// serialize on it, so at most one cycle runs at a time.
    cursor: Mutex<Option<DateTime<Utc>>>,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: PollerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> PollerState {
        PollerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// One check-then-maybe-refresh cycle.
    async fn run_cycle(&self) {
        let mut cursor = self.cursor.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }

        self.set_state(PollerState::Checking);

        match self.client.check_updates(*cursor).await {
            Ok(check) if check.has_updates => {
                debug!(last_check = %check.last_check, "Change detected, refreshing");
                self.refresh_locked(&mut cursor).await;
            }
            Ok(_) => {
                // No change; cursor unchanged.
            }
            Err(ClientError::Unauthorized) => {
                self.expire_session();
                return;
            }
            Err(error) => {
                warn!(%error, "Poll check failed");
                self.view.transient_error("checking for updates", &error);
            }
        }

        self.set_state(PollerState::Polling);
    }

    /// Full refetch under the cursor lock: replace the view, then stamp
    /// the cursor with the local completion time.
    async fn refresh_locked(&self, cursor: &mut Option<DateTime<Utc>>) {
        self.set_state(PollerState::Refreshing);

        match self.client.fetch_messages().await {
            Ok(messages) => {
                self.view.replace_all(messages);
                *cursor = Some(Utc::now());
            }
            Err(ClientError::Unauthorized) => {
                self.expire_session();
            }
            Err(error) => {
                warn!(%error, "Refetch failed; retrying on next cycle");
                self.view.transient_error("refreshing messages", &error);
            }
        }
    }

    /// Bypass refresh used by mutations and the search fallback.
    async fn force_refresh(&self) {
        let mut cursor = self.cursor.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }

        self.refresh_locked(&mut cursor).await;

        if !self.cancel.is_cancelled() {
            self.set_state(PollerState::Polling);
        }
    }

    /// Hard exit from the protocol: stop the timer for good and tell the
    /// view to leave the chat context.
    fn expire_session(&self) {
        self.cancel.cancel();
        self.set_state(PollerState::Stopped);
        self.view.session_expired();
    }
}

/// The client poller.
///
/// Drives the recurring poll cycle on a background task. User mutations
/// go through [`Poller::send_message`] and friends so the initiating
/// client sees its own writes immediately; other clients observe them on
/// their next tick, bounded by the configured interval.
pub struct Poller {
    shared: Arc<Shared>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Create a poller in the Idle state.
    pub fn new(client: ChatClient, view: Arc<dyn MessageView>, config: PollerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                view,
                cursor: Mutex::new(None),
                state: AtomicU8::new(PollerState::Idle as u8),
                cancel: CancellationToken::new(),
            }),
            interval: config.interval.max(MIN_POLL_INTERVAL),
            task: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollerState {
        self.shared.state()
    }

    /// The cursor as of the last completed refetch.
    pub async fn cursor(&self) -> Option<DateTime<Utc>> {
        *self.shared.cursor.lock().await
    }

    /// Arm the polling loop.
    ///
    /// The first cycle runs immediately; subsequent cycles run at the
    /// configured interval. Starting a poller that is not Idle is a
    /// no-op: there is no resume from Stopped, a fresh poller is
    /// required.
    pub fn start(&mut self) {
        if self.shared.state() != PollerState::Idle {
            return;
        }

        self.shared.set_state(PollerState::Polling);

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A cycle must fully complete before the next can start; a
            // missed tick is delayed, not burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => break,
                    _ = ticker.tick() => shared.run_cycle().await,
                }

                if shared.cancel.is_cancelled() {
                    break;
                }
            }
        }));
    }

    /// Tear the poller down: cancel the timer and wait for any in-flight
    /// cycle to finish. No further cycles run afterwards.
    pub async fn stop(&mut self) {
        self.shared.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.shared.set_state(PollerState::Stopped);
    }

    /// Send a message, then immediately refresh so this client sees its
    /// own write without waiting for the next tick.
    ///
    /// A server-side rejection (e.g. empty text) propagates to the
    /// caller and triggers no refresh.
    pub async fn send_message(&self, text: &str) -> Result<Message, ClientError> {
        let message = self.shared.client.send_message(text).await?;
        self.shared.force_refresh().await;
        Ok(message)
    }

    /// Edit a message, then immediately refresh.
    pub async fn edit_message(&self, id: i64, text: &str) -> Result<Message, ClientError> {
        let message = self.shared.client.edit_message(id, text).await?;
        self.shared.force_refresh().await;
        Ok(message)
    }

    /// Delete a message, then immediately refresh.
    pub async fn delete_message(&self, id: i64) -> Result<(), ClientError> {
        self.shared.client.delete_message(id).await?;
        self.shared.force_refresh().await;
        Ok(())
    }

    /// One-shot search. Results replace the displayed set but the cursor
    /// is untouched: search does not participate in the polling
    /// protocol. A transport failure falls back to a full refresh rather
    /// than leaving stale results on screen.
    pub async fn search(&self, query: &str) -> Result<(), ClientError> {
        match self.shared.client.search_messages(query).await {
            Ok(messages) => {
                self.shared.view.replace_all(messages);
                Ok(())
            }
            Err(ClientError::Unauthorized) => {
                self.shared.expire_session();
                Err(ClientError::Unauthorized)
            }
            Err(error) => {
                warn!(%error, "Search failed; falling back to full refresh");
                self.shared.view.transient_error("searching messages", &error);
                self.shared.force_refresh().await;
                Err(error)
            }
        }
    }

    /// Return from search results to the all-messages view.
    pub async fn show_all(&self) {
        self.shared.force_refresh().await;
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        // Page/context teardown without an explicit stop still cancels
        // the timer; the task notices on its next select.
        self.shared.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            PollerState::Idle,
            PollerState::Polling,
            PollerState::Checking,
            PollerState::Refreshing,
            PollerState::Stopped,
        ] {
            assert_eq!(PollerState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_config_default_interval() {
        assert_eq!(PollerConfig::default().interval, DEFAULT_POLL_INTERVAL);
    }
}
