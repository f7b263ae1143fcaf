//! Conversation message store
//!
//! The store is the single source of truth for a conversation's messages and
//! its ephemeral streaming/typing flags. Every mutation is expressed as a
//! [`StoreEvent`] and applied through [`MessageStore::apply`]; the named
//! operations (`append_message`, `begin_streaming`, ...) are thin wrappers
//! that build the matching event.
//!
//! [`SharedStore`] is the handle a conversation session hands to its send
//! coordinator and poller. It serializes access and re-broadcasts every
//! applied event to subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::conversation::message::{Message, Role};

/// Capacity of the per-store event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of a conversation as the rendering layer sees it
///
/// `is_streaming == true` implies `streaming_message_id` is set. At most one
/// message streams at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// Messages in arrival order; use [`sorted_messages`](Self::sorted_messages) to display
    pub messages: Vec<Message>,
    /// Assistant is composing and no content is visible yet
    pub is_typing: bool,
    /// An assistant message is receiving incremental content
    pub is_streaming: bool,
    /// Message currently receiving tokens
    pub streaming_message_id: Option<String>,
    /// Partial text accumulated for the streaming message
    pub streaming_buffer: String,
    /// Short-lived status shown instead of a generic typing indicator
    pub contextual_status: Option<String>,
}

impl ConversationState {
    /// Returns messages in ascending timestamp order
    ///
    /// Arrival order is irrelevant; messages sharing a timestamp keep their
    /// relative insertion order.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use coachline::conversation::{Message, MessageStore};
    ///
    /// let mut store = MessageStore::new();
    /// for secs in [3, 1, 2] {
    ///     let ts = Utc.timestamp_opt(secs, 0).unwrap();
    ///     store.append_message(Message::user(secs.to_string()).with_timestamp(ts));
    /// }
    /// let order: Vec<_> = store
    ///     .state()
    ///     .sorted_messages()
    ///     .iter()
    ///     .map(|m| m.content.as_str())
    ///     .collect();
    /// assert_eq!(order, ["1", "2", "3"]);
    /// ```
    pub fn sorted_messages(&self) -> Vec<&Message> {
        let mut sorted: Vec<&Message> = self.messages.iter().collect();
        sorted.sort_by_key(|m| m.timestamp);
        sorted
    }

    /// Looks up a message by id
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Returns true when at least one message is present
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Closed set of store mutations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Insert a message; an existing message with the same id is replaced
    MessageAppended(Message),
    /// Mark a message as the active streaming target
    StreamStarted {
        /// Target message
        message_id: String,
    },
    /// Incremental text for the active stream
    StreamToken(String),
    /// Stream finished; final content is written into the target message
    StreamEnded {
        /// Authoritative content of the finished message
        final_content: String,
        /// Metadata merged into the finished message
        metadata: HashMap<String, serde_json::Value>,
    },
    /// Stream failed; clears streaming state and drops an empty placeholder
    StreamAborted,
    /// Typing flag changed
    TypingChanged(bool),
    /// Contextual status set or cleared
    ContextualStatusChanged(Option<String>),
    /// Messages fetched by the poller, merged by id
    PollResult(Vec<Message>),
    /// Replace the whole transcript (initial load)
    Reset(Vec<Message>),
}

/// Owner of one conversation's [`ConversationState`]
#[derive(Debug, Default)]
pub struct MessageStore {
    state: ConversationState,
}

impl MessageStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with messages
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            state: ConversationState {
                messages,
                ..ConversationState::default()
            },
        }
    }

    /// Read-only view of the current state
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Applies one event
    ///
    /// Returns `true` if the state changed. Events that do not apply to the
    /// current state (a token with no active stream, a second stream while
    /// one is active) are no-ops and return `false`.
    pub fn apply(&mut self, event: &StoreEvent) -> bool {
        let state = &mut self.state;
        match event {
            StoreEvent::MessageAppended(message) => {
                match state.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => *existing = message.clone(),
                    None => state.messages.push(message.clone()),
                }
                true
            }
            StoreEvent::StreamStarted { message_id } => {
                if state.is_streaming && state.streaming_message_id.as_ref() != Some(message_id) {
                    tracing::debug!(
                        active = ?state.streaming_message_id,
                        requested = %message_id,
                        "Ignoring stream start while another stream is active"
                    );
                    return false;
                }
                state.is_streaming = true;
                state.streaming_message_id = Some(message_id.clone());
                state.streaming_buffer.clear();
                true
            }
            StoreEvent::StreamToken(text) => {
                if !state.is_streaming {
                    return false;
                }
                state.streaming_buffer.push_str(text);
                true
            }
            StoreEvent::StreamEnded {
                final_content,
                metadata,
            } => {
                let Some(target) = state.streaming_message_id.take() else {
                    return false;
                };
                match state.messages.iter_mut().find(|m| m.id == target) {
                    Some(message) => {
                        message.content = final_content.clone();
                        message.metadata.extend(metadata.clone());
                    }
                    None => {
                        let mut message =
                            Message::new(Role::Assistant, final_content.clone()).with_id(target);
                        message.metadata = metadata.clone();
                        state.messages.push(message);
                    }
                }
                state.is_streaming = false;
                state.streaming_buffer.clear();
                true
            }
            StoreEvent::StreamAborted => {
                let Some(target) = state.streaming_message_id.take() else {
                    return false;
                };
                state
                    .messages
                    .retain(|m| !(m.id == target && m.content.is_empty()));
                state.is_streaming = false;
                state.streaming_buffer.clear();
                true
            }
            StoreEvent::TypingChanged(typing) => {
                let changed = state.is_typing != *typing;
                state.is_typing = *typing;
                changed
            }
            StoreEvent::ContextualStatusChanged(status) => {
                let changed = state.contextual_status != *status;
                state.contextual_status = status.clone();
                changed
            }
            StoreEvent::PollResult(fetched) => {
                let known: HashSet<String> = state.messages.iter().map(|m| m.id.clone()).collect();
                let before = state.messages.len();
                state.messages.extend(
                    fetched
                        .iter()
                        .filter(|m| !known.contains(&m.id))
                        .cloned(),
                );
                state.messages.len() != before
            }
            StoreEvent::Reset(messages) => {
                *state = ConversationState {
                    messages: messages.clone(),
                    ..ConversationState::default()
                };
                true
            }
        }
    }

    /// Inserts a message (consumers sort on read)
    pub fn append_message(&mut self, message: Message) {
        self.apply(&StoreEvent::MessageAppended(message));
    }

    /// Starts streaming into `message_id`
    ///
    /// No-op if a different stream is already active; the send coordinator
    /// is responsible for never starting two.
    pub fn begin_streaming(&mut self, message_id: impl Into<String>) {
        self.apply(&StoreEvent::StreamStarted {
            message_id: message_id.into(),
        });
    }

    /// Appends text to the streaming buffer; no-op when not streaming
    pub fn append_streaming_token(&mut self, text: impl Into<String>) {
        self.apply(&StoreEvent::StreamToken(text.into()));
    }

    /// Writes the final content into the target message and clears streaming state
    pub fn end_streaming(&mut self, final_content: impl Into<String>) {
        self.apply(&StoreEvent::StreamEnded {
            final_content: final_content.into(),
            metadata: HashMap::new(),
        });
    }

    /// Clears streaming state after a failed stream
    pub fn abort_streaming(&mut self) {
        self.apply(&StoreEvent::StreamAborted);
    }

    /// Sets the typing flag
    pub fn set_typing(&mut self, typing: bool) {
        self.apply(&StoreEvent::TypingChanged(typing));
    }

    /// Sets or clears the contextual status
    pub fn set_contextual_status(&mut self, status: Option<String>) {
        self.apply(&StoreEvent::ContextualStatusChanged(status));
    }
}

/// Cloneable, thread-safe handle to a [`MessageStore`]
///
/// Applied events are broadcast to every receiver obtained from
/// [`subscribe`](Self::subscribe). Lagging receivers lose old events but
/// can always resynchronize from [`snapshot`](Self::snapshot).
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<MessageStore>>,
    events: broadcast::Sender<StoreEvent>,
}

impl SharedStore {
    /// Creates a handle around an empty store
    pub fn new() -> Self {
        Self::from_store(MessageStore::new())
    }

    /// Wraps an existing store
    pub fn from_store(store: MessageStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(store)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MessageStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies an event and notifies subscribers if the state changed
    pub fn apply(&self, event: StoreEvent) -> bool {
        let changed = self.lock().apply(&event);
        if changed {
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
        changed
    }

    /// Clones the current state
    pub fn snapshot(&self) -> ConversationState {
        self.lock().state().clone()
    }

    /// Runs `f` against the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&ConversationState) -> R) -> R {
        f(self.lock().state())
    }

    /// Number of messages currently held
    pub fn message_count(&self) -> usize {
        self.read(|state| state.messages.len())
    }

    /// Subscribes to applied events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::at;

    #[test]
    fn test_sorted_messages_orders_by_timestamp() {
        let mut store = MessageStore::new();
        store.append_message(Message::user("three").with_timestamp(at(3)));
        store.append_message(Message::user("one").with_timestamp(at(1)));
        store.append_message(Message::user("two").with_timestamp(at(2)));

        let contents: Vec<&str> = store
            .state()
            .sorted_messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        // insertion order is untouched
        assert_eq!(store.state().messages[0].content, "three");
    }

    #[test]
    fn test_sorted_messages_is_stable_for_equal_timestamps() {
        let mut store = MessageStore::new();
        store.append_message(Message::user("a").with_timestamp(at(5)));
        store.append_message(Message::assistant("b").with_timestamp(at(5)));

        let sorted = store.state().sorted_messages();
        assert_eq!(sorted[0].content, "a");
        assert_eq!(sorted[1].content, "b");
    }

    #[test]
    fn test_append_with_existing_id_replaces() {
        let mut store = MessageStore::new();
        store.append_message(Message::assistant("draft").with_id("m1"));
        store.append_message(Message::assistant("final").with_id("m1"));

        assert_eq!(store.state().messages.len(), 1);
        assert_eq!(store.state().messages[0].content, "final");
    }

    #[test]
    fn test_streaming_lifecycle() {
        let mut store = MessageStore::new();
        store.append_message(Message::assistant("").with_id("m1"));
        store.begin_streaming("m1");
        assert!(store.state().is_streaming);
        assert_eq!(store.state().streaming_message_id.as_deref(), Some("m1"));

        store.append_streaming_token("H");
        store.append_streaming_token("i");
        assert_eq!(store.state().streaming_buffer, "Hi");

        store.end_streaming("Hi there!");
        let state = store.state();
        assert!(!state.is_streaming);
        assert!(state.streaming_message_id.is_none());
        assert!(state.streaming_buffer.is_empty());
        assert_eq!(state.message("m1").unwrap().content, "Hi there!");
    }

    #[test]
    fn test_begin_streaming_ignored_while_other_stream_active() {
        let mut store = MessageStore::new();
        store.begin_streaming("m1");
        store.append_streaming_token("partial");
        store.begin_streaming("m2");

        assert_eq!(store.state().streaming_message_id.as_deref(), Some("m1"));
        assert_eq!(store.state().streaming_buffer, "partial");
    }

    #[test]
    fn test_token_without_stream_is_noop() {
        let mut store = MessageStore::new();
        assert!(!store.apply(&StoreEvent::StreamToken("lost".to_string())));
        assert!(store.state().streaming_buffer.is_empty());
    }

    #[test]
    fn test_end_streaming_appends_missing_target() {
        let mut store = MessageStore::new();
        store.begin_streaming("late");
        store.end_streaming("arrived");

        let message = store.state().message("late").unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "arrived");
    }

    #[test]
    fn test_stream_ended_merges_metadata() {
        let mut store = MessageStore::new();
        store.append_message(Message::assistant("").with_id("m1"));
        store.begin_streaming("m1");
        let mut metadata = HashMap::new();
        metadata.insert("mode".to_string(), serde_json::json!("taper"));
        store.apply(&StoreEvent::StreamEnded {
            final_content: "done".to_string(),
            metadata,
        });
        assert_eq!(store.state().message("m1").unwrap().mode(), Some("taper"));
    }

    #[test]
    fn test_abort_removes_empty_placeholder_only() {
        let mut store = MessageStore::new();
        store.append_message(Message::assistant("").with_id("m1"));
        store.begin_streaming("m1");
        store.append_streaming_token("half");
        store.abort_streaming();

        assert!(store.state().message("m1").is_none());
        assert!(!store.state().is_streaming);
        assert!(store.state().streaming_buffer.is_empty());

        store.append_message(Message::assistant("kept").with_id("m2"));
        store.begin_streaming("m2");
        store.abort_streaming();
        assert!(store.state().message("m2").is_some());
    }

    #[test]
    fn test_poll_result_merges_by_id() {
        let mut store = MessageStore::new();
        store.append_message(Message::user("hello").with_id("u1"));

        let changed = store.apply(&StoreEvent::PollResult(vec![
            Message::user("hello").with_id("u1"),
            Message::assistant("hi").with_id("a1"),
        ]));
        assert!(changed);
        assert_eq!(store.state().messages.len(), 2);

        let unchanged = store.apply(&StoreEvent::PollResult(vec![
            Message::assistant("hi").with_id("a1")
        ]));
        assert!(!unchanged);
    }

    #[test]
    fn test_reset_clears_ephemeral_state() {
        let mut store = MessageStore::new();
        store.set_typing(true);
        store.begin_streaming("m1");
        store.set_contextual_status(Some("analyzing".to_string()));

        store.apply(&StoreEvent::Reset(vec![Message::user("fresh")]));
        let state = store.state();
        assert_eq!(state.messages.len(), 1);
        assert!(!state.is_typing);
        assert!(!state.is_streaming);
        assert!(state.contextual_status.is_none());
    }

    #[test]
    fn test_flag_setters_report_changes() {
        let mut store = MessageStore::new();
        assert!(store.apply(&StoreEvent::TypingChanged(true)));
        assert!(!store.apply(&StoreEvent::TypingChanged(true)));
        assert!(store.apply(&StoreEvent::ContextualStatusChanged(Some(
            "reviewing splits".to_string()
        ))));
        store.set_contextual_status(None);
        assert!(store.state().contextual_status.is_none());
    }

    #[tokio::test]
    async fn test_shared_store_broadcasts_changes_only() {
        let store = SharedStore::new();
        let mut rx = store.subscribe();

        store.apply(StoreEvent::TypingChanged(true));
        store.apply(StoreEvent::TypingChanged(true));
        store.apply(StoreEvent::MessageAppended(Message::user("hey").with_id("u1")));

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::TypingChanged(true));
        assert!(matches!(
            rx.recv().await.unwrap(),
            StoreEvent::MessageAppended(m) if m.id == "u1"
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.message_count(), 1);
    }

    #[test]
    fn test_shared_store_clones_share_state() {
        let store = SharedStore::new();
        let other = store.clone();
        other.apply(StoreEvent::MessageAppended(Message::user("shared")));
        assert_eq!(store.snapshot().messages[0].content, "shared");
    }
}
