//! Per-conversation session lifecycle
//!
//! A [`ConversationSession`] owns everything that belongs to exactly one
//! open conversation: its store, its send coordinator and its poller. It is
//! created when a conversation is opened and closed when the user moves on,
//! so timers and streams never outlive the conversation they belong to.
//!
//! [`SessionManager`] keeps at most one session open and remembers which
//! conversations were already polled across sessions.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::conversation::{
    ConversationIds, ConversationRecord, ConversationState, SharedStore, StoreEvent,
    TypingIndicator, TypingStateResolver,
};
use crate::error::Result;
use crate::sync::{
    ConversationPoller, PollOutcome, PollState, PollingConfig, SendCoordinator, SendHooks,
    SendOutcome,
};
use crate::transport::{ChatTransport, SendRequest};

/// Behaviour switches shared by every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Prefer streaming sends
    pub enable_streaming: bool,
    /// First-reply polling timing
    pub polling: PollingConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enable_streaming: true,
            polling: PollingConfig::default(),
        }
    }
}

impl SessionOptions {
    /// Builds options from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            enable_streaming: config.streaming.enabled,
            polling: PollingConfig::from(&config.polling),
        }
    }
}

/// One open conversation
#[derive(Debug)]
pub struct ConversationSession {
    ids: ConversationIds,
    transport: Arc<dyn ChatTransport>,
    store: SharedStore,
    sender: SendCoordinator,
    poller: ConversationPoller,
    title: String,
    mode: Option<String>,
    closed: bool,
}

impl ConversationSession {
    /// Creates a session with an empty store; call [`load`](Self::load) next
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        ids: ConversationIds,
        options: SessionOptions,
    ) -> Self {
        let store = SharedStore::new();
        let sender = SendCoordinator::new(
            Arc::clone(&transport),
            store.clone(),
            ids.clone(),
            options.enable_streaming,
        );
        let poller = ConversationPoller::new(Arc::clone(&transport), options.polling);
        Self {
            ids,
            transport,
            store,
            sender,
            poller,
            title: String::new(),
            mode: None,
            closed: false,
        }
    }

    fn with_attempted(mut self, attempted: HashSet<String>) -> Self {
        self.poller = self.poller.with_attempted(attempted);
        self
    }

    /// Conversation this session is bound to
    pub fn ids(&self) -> &ConversationIds {
        &self.ids
    }

    /// Store handle, for rendering and subscriptions
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Send coordinator, for callers that issue sends concurrently
    pub fn sender(&self) -> &SendCoordinator {
        &self.sender
    }

    /// Conversation title as last loaded or updated
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Coaching mode as last loaded or updated
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// Copy of the current conversation state
    pub fn snapshot(&self) -> ConversationState {
        self.store.snapshot()
    }

    /// Typing affordance for the current state
    pub fn typing_indicator(&self) -> TypingIndicator {
        self.store.read(TypingStateResolver::resolve)
    }

    /// Poller state
    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    /// Fetches the conversation and replaces the local transcript
    ///
    /// Starts first-reply polling when the conversation has no messages yet.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the fetch fails.
    pub async fn load(&mut self) -> Result<ConversationRecord> {
        let record = self.transport.fetch_conversation(&self.ids).await?;
        tracing::info!(
            conversation = %self.ids,
            messages = record.messages.len(),
            "Conversation loaded"
        );

        self.title = record.title.clone();
        self.mode = record.mode.clone();
        self.store.apply(StoreEvent::Reset(record.messages.clone()));

        if record.messages.is_empty() && !self.closed {
            self.poller.start(&self.ids, self.store.clone());
        }
        Ok(record)
    }

    /// Waits until first-reply polling ends
    ///
    /// Returns `None` if no polling session is pending.
    pub async fn wait_for_first_reply(&mut self) -> Option<PollOutcome> {
        self.poller.wait().await
    }

    /// Sends a user message
    ///
    /// Any first-reply polling is stopped first; the send itself delivers
    /// the reply from here on.
    ///
    /// # Errors
    ///
    /// Returns the transport error of a failed exchange.
    pub async fn send(&mut self, request: SendRequest, hooks: SendHooks) -> Result<SendOutcome> {
        self.poller.stop();
        let request = match (&request.mode, &self.mode) {
            (None, Some(mode)) => request.with_mode(mode.clone()),
            _ => request,
        };
        self.sender.send(request, hooks).await
    }

    /// Renames the conversation
    ///
    /// # Errors
    ///
    /// Returns the transport error if the update fails.
    pub async fn update_title(&mut self, title: &str) -> Result<()> {
        self.transport.update_title(&self.ids, title).await?;
        self.title = title.to_string();
        tracing::info!(conversation = %self.ids, "Title updated");
        Ok(())
    }

    /// Switches the coaching mode used for subsequent messages
    ///
    /// # Errors
    ///
    /// Returns the transport error if the update fails.
    pub async fn update_mode(&mut self, mode: &str) -> Result<()> {
        self.transport.update_mode(&self.ids, mode).await?;
        self.mode = Some(mode.to_string());
        tracing::info!(conversation = %self.ids, mode, "Mode updated");
        Ok(())
    }

    /// Deletes the conversation on the backend and closes the session
    ///
    /// # Errors
    ///
    /// Returns the transport error if the deletion fails; the session is
    /// closed either way.
    pub async fn delete(mut self) -> Result<()> {
        self.close();
        self.transport.delete_conversation(&self.ids).await?;
        tracing::info!(conversation = %self.ids, "Conversation deleted");
        Ok(())
    }

    /// Stops background work; idempotent
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(conversation = %self.ids, "Closing session");
            self.closed = true;
        }
        self.poller.stop();
    }

    /// Returns true once [`close`](Self::close) ran
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Holds the single open [`ConversationSession`]
#[derive(Debug)]
pub struct SessionManager {
    transport: Arc<dyn ChatTransport>,
    options: SessionOptions,
    attempted: HashSet<String>,
    current: Option<ConversationSession>,
}

impl SessionManager {
    /// Creates a manager with no open session
    pub fn new(transport: Arc<dyn ChatTransport>, options: SessionOptions) -> Self {
        Self {
            transport,
            options,
            attempted: HashSet::new(),
            current: None,
        }
    }

    /// Closes the current session (if any) and opens one for `ids`
    ///
    /// The previous session's poller is stopped before the new session
    /// exists, so no timer of the old conversation survives the switch.
    pub fn open(&mut self, ids: ConversationIds) -> &mut ConversationSession {
        self.close_current();
        let session = ConversationSession::new(Arc::clone(&self.transport), ids, self.options)
            .with_attempted(self.attempted.clone());
        self.current.insert(session)
    }

    /// Currently open session
    pub fn current(&self) -> Option<&ConversationSession> {
        self.current.as_ref()
    }

    /// Currently open session, mutably
    pub fn current_mut(&mut self) -> Option<&mut ConversationSession> {
        self.current.as_mut()
    }

    /// Closes the current session, if any
    pub fn close_current(&mut self) {
        if let Some(mut session) = self.current.take() {
            session.close();
            self.attempted
                .extend(session.poller.attempted().iter().cloned());
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_current();
    }
}
