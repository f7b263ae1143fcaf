//! Send coordination
//!
//! [`SendCoordinator`] turns one user "send" action into exactly one network
//! exchange. It prefers the streaming transport and falls back to a one-shot
//! request only when streaming is disabled or the transport cannot stream.
//! A stream that fails after opening is reported, never retried.
//!
//! Re-entrant calls are expected (double-submit from a UI); they resolve to
//! [`SendOutcome::Skipped`] instead of an error.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;

use crate::conversation::{new_message_id, ConversationIds, Message, SharedStore, StoreEvent};
use crate::error::{CoachlineError, Result};
use crate::transport::{ChatTransport, SendRequest, StreamFrame};

/// Send lifecycle of one coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// No send in flight
    Idle,
    /// A send is in flight
    Sending,
}

impl SendState {
    /// Moves to `to`, rejecting `Idle -> Idle` and `Sending -> Sending`
    ///
    /// # Errors
    ///
    /// Returns [`CoachlineError::IllegalTransition`] for a self-transition.
    pub fn transition(self, to: SendState) -> Result<SendState> {
        match (self, to) {
            (SendState::Idle, SendState::Sending) | (SendState::Sending, SendState::Idle) => Ok(to),
            _ => Err(CoachlineError::IllegalTransition {
                from: self.to_string(),
                to: to.to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendState::Idle => write!(f, "idle"),
            SendState::Sending => write!(f, "sending"),
        }
    }
}

/// Proof that the holder owns the in-flight slot
///
/// Dropping the permit returns the coordinator to [`SendState::Idle`]. This
/// happens exactly once, on every exit path including panics and
/// cancellation of the send future.
#[derive(Debug)]
pub struct SendPermit {
    state: Arc<Mutex<SendState>>,
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.transition(SendState::Idle) {
            Ok(next) => *state = next,
            Err(e) => tracing::error!("Failed to release send permit: {}", e),
        }
    }
}

/// Clears the transient exchange state of the store when dropped
///
/// Aborts a stream that never finished (removing its empty placeholder),
/// then clears typing and any contextual status. Dropping the send future
/// mid-exchange therefore leaves no stale streaming target behind.
struct ExchangeCleanup {
    store: SharedStore,
}

impl Drop for ExchangeCleanup {
    fn drop(&mut self) {
        // no-op when the stream already ended or aborted
        if self.store.apply(StoreEvent::StreamAborted) {
            tracing::debug!("Send dropped mid-stream, streaming state cleared");
        }
        self.store.apply(StoreEvent::TypingChanged(false));
        self.store.apply(StoreEvent::ContextualStatusChanged(None));
    }
}

/// Why a send was not issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither text nor attachments
    Empty,
    /// Another send is still in flight
    InFlight,
}

/// Result of [`SendCoordinator::send`]
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The exchange completed; carries the assistant reply as stored
    Sent(Message),
    /// Nothing was sent
    Skipped(SkipReason),
}

type StartHook = Box<dyn FnMut(&str) + Send>;
type ErrorHook = Box<dyn FnMut(&anyhow::Error) + Send>;
type CompleteHook = Box<dyn FnMut(&Message) + Send>;

/// Optional callbacks for one send
///
/// # Examples
///
/// ```
/// use coachline::sync::SendHooks;
///
/// let hooks = SendHooks::new()
///     .on_streaming_start(|id| println!("streaming into {id}"))
///     .on_streaming_error(|e| eprintln!("stream failed: {e}"));
/// # let _ = hooks;
/// ```
#[derive(Default)]
pub struct SendHooks {
    on_streaming_start: Option<StartHook>,
    on_streaming_error: Option<ErrorHook>,
    on_complete: Option<CompleteHook>,
}

impl SendHooks {
    /// Creates hooks with no callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the assistant message id once the stream is open
    pub fn on_streaming_start(mut self, hook: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_streaming_start = Some(Box::new(hook));
        self
    }

    /// Called when the streaming exchange fails
    pub fn on_streaming_error(mut self, hook: impl FnMut(&anyhow::Error) + Send + 'static) -> Self {
        self.on_streaming_error = Some(Box::new(hook));
        self
    }

    /// Called with the final assistant message
    pub fn on_complete(mut self, hook: impl FnMut(&Message) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    fn streaming_started(&mut self, message_id: &str) {
        if let Some(hook) = self.on_streaming_start.as_mut() {
            hook(message_id);
        }
    }

    fn streaming_failed(&mut self, error: &anyhow::Error) {
        if let Some(hook) = self.on_streaming_error.as_mut() {
            hook(error);
        }
    }

    fn completed(&mut self, message: &Message) {
        if let Some(hook) = self.on_complete.as_mut() {
            hook(message);
        }
    }
}

impl fmt::Debug for SendHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendHooks")
            .field("on_streaming_start", &self.on_streaming_start.is_some())
            .field("on_streaming_error", &self.on_streaming_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Issues user messages for one conversation
#[derive(Debug)]
pub struct SendCoordinator {
    transport: Arc<dyn ChatTransport>,
    store: SharedStore,
    ids: ConversationIds,
    enable_streaming: bool,
    state: Arc<Mutex<SendState>>,
}

impl SendCoordinator {
    /// Creates a coordinator writing into `store`
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: SharedStore,
        ids: ConversationIds,
        enable_streaming: bool,
    ) -> Self {
        Self {
            transport,
            store,
            ids,
            enable_streaming,
            state: Arc::new(Mutex::new(SendState::Idle)),
        }
    }

    /// Current send state
    pub fn state(&self) -> SendState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while a send is in flight
    pub fn is_sending(&self) -> bool {
        self.state() == SendState::Sending
    }

    /// Claims the in-flight slot, or returns `None` if it is taken
    pub fn try_acquire(&self) -> Option<SendPermit> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.transition(SendState::Sending) {
            Ok(next) => {
                *state = next;
                Some(SendPermit {
                    state: Arc::clone(&self.state),
                })
            }
            Err(_) => None,
        }
    }

    /// Sends one user message and waits for the assistant reply
    ///
    /// The user message is appended to the store before any network call.
    /// Typing is shown while waiting and cleared afterwards, together with
    /// any contextual status. The same cleanup runs when the returned future
    /// is dropped before completion; the user message stays.
    ///
    /// A streamed reply keeps the locally generated id it was streamed
    /// into. The final frame contributes its content and metadata only, so
    /// the id differs from the backend's until the conversation is reloaded.
    ///
    /// # Errors
    ///
    /// Returns the transport error of a failed exchange. Nothing is retried.
    pub async fn send(&self, mut request: SendRequest, mut hooks: SendHooks) -> Result<SendOutcome> {
        if request.is_empty() {
            tracing::debug!(conversation = %self.ids, "Skipping empty send");
            return Ok(SendOutcome::Skipped(SkipReason::Empty));
        }

        let Some(_permit) = self.try_acquire() else {
            tracing::debug!(conversation = %self.ids, "Send already in flight, skipping");
            return Ok(SendOutcome::Skipped(SkipReason::InFlight));
        };

        let mut user_message = Message::user(request.text.clone())
            .with_attachments(request.attachments.clone());
        if let Some(mode) = &request.mode {
            user_message = user_message.with_mode(mode.clone());
        }
        request.client_message_id = Some(user_message.id.clone());
        self.store.apply(StoreEvent::MessageAppended(user_message));
        self.store.apply(StoreEvent::TypingChanged(true));
        let cleanup = ExchangeCleanup {
            store: self.store.clone(),
        };

        let streaming = self.enable_streaming && self.transport.supports_streaming();
        tracing::info!(
            conversation = %self.ids,
            streaming,
            attachments = request.attachments.len(),
            "Sending message"
        );

        let result = if streaming {
            self.send_streaming(&request, &mut hooks).await
        } else {
            self.send_once(&request).await
        };

        drop(cleanup);

        match result {
            Ok(reply) => {
                hooks.completed(&reply);
                Ok(SendOutcome::Sent(reply))
            }
            Err(e) => {
                tracing::warn!(conversation = %self.ids, "Send failed: {:#}", e);
                Err(e)
            }
        }
    }

    async fn send_once(&self, request: &SendRequest) -> Result<Message> {
        let reply = self.transport.send_message(&self.ids, request).await?;
        self.store.apply(StoreEvent::MessageAppended(reply.clone()));
        Ok(reply)
    }

    async fn send_streaming(&self, request: &SendRequest, hooks: &mut SendHooks) -> Result<Message> {
        let mut frames = match self.transport.stream_message(&self.ids, request).await {
            Ok(frames) => frames,
            Err(e)
                if matches!(
                    e.downcast_ref::<CoachlineError>(),
                    Some(CoachlineError::StreamingNotSupported)
                ) =>
            {
                tracing::debug!("Transport declined streaming, using one-shot send");
                return self.send_once(request).await;
            }
            Err(e) => {
                hooks.streaming_failed(&e);
                return Err(e);
            }
        };

        let message_id = new_message_id();
        self.store.apply(StoreEvent::StreamStarted {
            message_id: message_id.clone(),
        });
        hooks.streaming_started(&message_id);

        let mut placeholder_added = false;
        let mut final_message = None;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(StreamFrame::Delta(text)) => {
                    if !placeholder_added {
                        self.store.apply(StoreEvent::MessageAppended(
                            Message::assistant("").with_id(message_id.clone()),
                        ));
                        placeholder_added = true;
                    }
                    tracing::debug!(len = text.len(), "Stream delta");
                    self.store.apply(StoreEvent::StreamToken(text));
                }
                Ok(StreamFrame::Status(status)) => {
                    tracing::debug!(status = %status, "Stream status");
                    self.store
                        .apply(StoreEvent::ContextualStatusChanged(Some(status)));
                }
                Ok(StreamFrame::Done(message)) => {
                    final_message = Some(message);
                    break;
                }
                Err(e) => {
                    self.store.apply(StoreEvent::StreamAborted);
                    hooks.streaming_failed(&e);
                    return Err(e);
                }
            }
        }

        let ended = match final_message {
            Some(message) => StoreEvent::StreamEnded {
                final_content: message.content,
                metadata: message.metadata,
            },
            None if placeholder_added => {
                tracing::debug!("Stream closed without a final frame, keeping buffer");
                StoreEvent::StreamEnded {
                    final_content: self.store.read(|s| s.streaming_buffer.clone()),
                    metadata: Default::default(),
                }
            }
            None => {
                self.store.apply(StoreEvent::StreamAborted);
                let e = CoachlineError::Stream("stream ended without content".to_string()).into();
                hooks.streaming_failed(&e);
                return Err(e);
            }
        };
        self.store.apply(ended);

        let stored = self.store.read(|s| s.message(&message_id).cloned());
        stored.ok_or_else(|| {
            CoachlineError::Stream(format!("streamed message {} missing from store", message_id))
                .into()
        })
    }
}
