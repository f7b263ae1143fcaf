//! First-reply polling
//!
//! A conversation that is created before its first assistant reply exists
//! gets that reply written later by the backend. [`ConversationPoller`]
//! re-fetches such a conversation on a fixed interval until messages show
//! up, a wall-clock budget runs out, or the session is cancelled.
//!
//! At most one polling session is active per poller. Starting a session for
//! another conversation cancels the previous one first, and a conversation
//! is only ever polled once per poller.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::conversation::{ConversationIds, SharedStore, StoreEvent};
use crate::error::{CoachlineError, Result};
use crate::transport::ChatTransport;

/// Timing of a polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Time between fetches
    pub interval: Duration,
    /// Total budget of one session
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(90),
        }
    }
}

impl PollingConfig {
    /// Creates a checked config
    ///
    /// # Errors
    ///
    /// Returns [`CoachlineError::Config`] if either duration is zero or the
    /// interval is not shorter than the timeout.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        let config = Self { interval, timeout };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the timing can drive a bounded session
    ///
    /// # Errors
    ///
    /// Same conditions as [`PollingConfig::new`].
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(
                CoachlineError::Config("poll interval must be greater than 0".to_string()).into(),
            );
        }
        if self.timeout.is_zero() {
            return Err(
                CoachlineError::Config("poll timeout must be greater than 0".to_string()).into(),
            );
        }
        if self.interval >= self.timeout {
            return Err(CoachlineError::Config(format!(
                "poll interval {:?} must be shorter than timeout {:?}",
                self.interval, self.timeout
            ))
            .into());
        }
        Ok(())
    }
}

impl From<&crate::config::PollingConfig> for PollingConfig {
    fn from(config: &crate::config::PollingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Observable poller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No session running
    Idle,
    /// A session is running
    Polling {
        /// Conversation being polled
        conversation_id: String,
        /// When the session started
        started_at: Instant,
    },
}

/// How a polling session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A fetch returned this many messages; they were merged into the store
    MessagesArrived(usize),
    /// The budget elapsed without any message
    TimedOut,
    /// The session was stopped or replaced
    Cancelled,
    /// A message reached the store through another path
    StoreNotEmpty,
}

#[derive(Debug)]
struct ActiveSession {
    conversation_id: String,
    started_at: Instant,
    cancel: CancellationToken,
    handle: JoinHandle<PollOutcome>,
}

/// Polls conversations that are waiting for their first reply
#[derive(Debug)]
pub struct ConversationPoller {
    transport: Arc<dyn ChatTransport>,
    config: PollingConfig,
    attempted: HashSet<String>,
    active: Option<ActiveSession>,
}

impl ConversationPoller {
    /// Creates an idle poller
    pub fn new(transport: Arc<dyn ChatTransport>, config: PollingConfig) -> Self {
        Self {
            transport,
            config,
            attempted: HashSet::new(),
            active: None,
        }
    }

    /// Seeds the set of conversations that must not be polled again
    pub fn with_attempted(mut self, conversation_ids: impl IntoIterator<Item = String>) -> Self {
        self.attempted.extend(conversation_ids);
        self
    }

    /// Conversations this poller has already polled
    pub fn attempted(&self) -> &HashSet<String> {
        &self.attempted
    }

    /// Timing used for new sessions
    pub fn config(&self) -> PollingConfig {
        self.config
    }

    /// Current state
    pub fn state(&self) -> PollState {
        match &self.active {
            Some(active) if !active.handle.is_finished() && !active.cancel.is_cancelled() => {
                PollState::Polling {
                    conversation_id: active.conversation_id.clone(),
                    started_at: active.started_at,
                }
            }
            _ => PollState::Idle,
        }
    }

    /// Returns true while a session is running
    pub fn is_polling(&self) -> bool {
        matches!(self.state(), PollState::Polling { .. })
    }

    /// Returns true if `conversation_id` was already polled by this poller
    pub fn was_attempted(&self, conversation_id: &str) -> bool {
        self.attempted.contains(conversation_id)
    }

    /// Starts polling `ids` when its store is still empty
    ///
    /// Returns `false` without side effects when the store already holds
    /// messages, the conversation is already being polled, it was polled
    /// before, or the timing fails [`PollingConfig::validate`]. Any session
    /// for a different conversation is cancelled before the new one starts.
    pub fn start(&mut self, ids: &ConversationIds, store: SharedStore) -> bool {
        if store.message_count() > 0 {
            return false;
        }
        if let Err(e) = self.config.validate() {
            tracing::warn!(conversation = %ids, "Not polling: {:#}", e);
            return false;
        }
        if self.attempted.contains(&ids.conversation_id) {
            tracing::debug!(conversation = %ids, "Polling already attempted, not restarting");
            return false;
        }

        self.stop();
        self.attempted.insert(ids.conversation_id.clone());

        let cancel = CancellationToken::new();
        let started_at = Instant::now();
        tracing::info!(
            conversation = %ids,
            interval_secs = self.config.interval.as_secs_f64(),
            timeout_secs = self.config.timeout.as_secs_f64(),
            "Polling for first reply"
        );
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.transport),
            ids.clone(),
            store,
            self.config,
            started_at,
            cancel.clone(),
        ));

        self.active = Some(ActiveSession {
            conversation_id: ids.conversation_id.clone(),
            started_at,
            cancel,
            handle,
        });
        true
    }

    /// Cancels the running session, if any
    ///
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            if !active.handle.is_finished() {
                tracing::debug!(conversation_id = %active.conversation_id, "Stopping poller");
            }
            active.cancel.cancel();
        }
    }

    /// Waits for the current session to end
    ///
    /// Returns `None` when no session was started since the last `wait` or
    /// `stop`.
    pub async fn wait(&mut self) -> Option<PollOutcome> {
        let active = self.active.take()?;
        match active.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!("Polling task failed: {}", e);
                Some(PollOutcome::Cancelled)
            }
        }
    }
}

impl Drop for ConversationPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_session(
    transport: Arc<dyn ChatTransport>,
    ids: ConversationIds,
    store: SharedStore,
    config: PollingConfig,
    started_at: Instant,
    cancel: CancellationToken,
) -> PollOutcome {
    let deadline = started_at + config.timeout;
    let mut next_fetch = started_at + config.interval;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep_until(next_fetch.min(deadline)) => {}
        }

        if Instant::now() >= deadline {
            tracing::info!(conversation = %ids, "Polling timed out without a reply");
            return PollOutcome::TimedOut;
        }

        if store.message_count() > 0 {
            tracing::debug!(conversation = %ids, "Messages already present, polling done");
            return PollOutcome::StoreNotEmpty;
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            result = tokio::time::timeout_at(deadline, transport.fetch_conversation(&ids)) => result,
        };

        match fetched {
            Err(_) => {
                tracing::info!(conversation = %ids, "Polling timed out during fetch");
                return PollOutcome::TimedOut;
            }
            Ok(Ok(record)) if !record.messages.is_empty() => {
                if cancel.is_cancelled() {
                    return PollOutcome::Cancelled;
                }
                let count = record.messages.len();
                store.apply(StoreEvent::PollResult(record.messages));
                tracing::info!(conversation = %ids, count, "Reply arrived, polling done");
                return PollOutcome::MessagesArrived(count);
            }
            Ok(Ok(_)) => {
                tracing::debug!(conversation = %ids, "No messages yet");
            }
            Ok(Err(e)) => {
                tracing::warn!(conversation = %ids, "Poll fetch failed: {:#}", e);
            }
        }

        next_fetch += config.interval;
    }
}
