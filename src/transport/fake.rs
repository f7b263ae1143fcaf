//! In-process scripted transport for unit and integration tests
//!
//! [`FakeTransport`] implements [`ChatTransport`] without any network I/O.
//! Tests script what the "backend" answers and inspect every call that was
//! made afterwards.
//!
//! # Scripting
//!
//! - [`FakeTransport::script_stream`] queues the frames of the next
//!   streaming exchange. An `Err(text)` entry makes the stream fail there.
//! - [`FakeTransport::script_send`] queues the next one-shot reply. With
//!   nothing queued, the fake answers with an assistant echo.
//! - [`FakeTransport::script_fetch`] queues the next fetch result. With
//!   nothing queued, the fake returns the record set by
//!   [`FakeTransport::set_conversation`].
//!
//! Every call is recorded before the configured latency elapses, so a call
//! counts as issued even if the caller stops waiting for it.
//!
//! # Example
//!
//! ```
//! use coachline::conversation::ConversationIds;
//! use coachline::transport::{ChatTransport, FakeTransport, SendRequest};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = FakeTransport::new();
//! let ids = ConversationIds::new("u1", "c1", "conv1");
//!
//! let reply = transport.send_message(&ids, &SendRequest::text("Hello")).await.unwrap();
//! assert!(reply.content.contains("Hello"));
//! assert_eq!(transport.send_count(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::conversation::{ConversationIds, ConversationRecord, Message};
use crate::error::{CoachlineError, Result};
use crate::transport::{ChatTransport, FrameStream, SendRequest, StreamFrame};

/// A call observed by [`FakeTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    /// `stream_message`
    Stream(SendRequest),
    /// `send_message`
    Send(SendRequest),
    /// `fetch_conversation`
    Fetch {
        /// Conversation that was fetched
        conversation_id: String,
        /// Clock reading when the fetch was issued
        at: tokio::time::Instant,
    },
    /// `update_title`
    UpdateTitle(String),
    /// `update_mode`
    UpdateMode(String),
    /// `delete_conversation`
    Delete(String),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<FakeCall>,
    streams: VecDeque<Vec<std::result::Result<StreamFrame, String>>>,
    sends: VecDeque<std::result::Result<Message, String>>,
    fetches: VecDeque<std::result::Result<ConversationRecord, String>>,
    conversation: Option<ConversationRecord>,
}

/// Scripted [`ChatTransport`] used in tests
#[derive(Debug, Default)]
pub struct FakeTransport {
    streaming: bool,
    latency: Duration,
    state: Mutex<FakeState>,
}

impl FakeTransport {
    /// Creates a fake without streaming support and zero latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake that advertises streaming support
    pub fn streaming() -> Self {
        Self {
            streaming: true,
            ..Self::default()
        }
    }

    /// Delays every reply (and every stream frame) by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Queues the frames of the next streaming exchange
    pub fn script_stream(&self, frames: Vec<std::result::Result<StreamFrame, String>>) {
        self.lock().streams.push_back(frames);
    }

    /// Queues the next one-shot reply
    pub fn script_send(&self, reply: std::result::Result<Message, String>) {
        self.lock().sends.push_back(reply);
    }

    /// Queues the next fetch result
    pub fn script_fetch(&self, reply: std::result::Result<ConversationRecord, String>) {
        self.lock().fetches.push_back(reply);
    }

    /// Sets the record returned when no fetch is queued
    pub fn set_conversation(&self, record: ConversationRecord) {
        self.lock().conversation = Some(record);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    /// Number of one-shot sends plus streaming sends
    pub fn outbound_count(&self) -> usize {
        self.send_count() + self.stream_count()
    }

    /// Number of `send_message` calls
    pub fn send_count(&self) -> usize {
        self.count(|c| matches!(c, FakeCall::Send(_)))
    }

    /// Number of `stream_message` calls
    pub fn stream_count(&self) -> usize {
        self.count(|c| matches!(c, FakeCall::Stream(_)))
    }

    /// Number of `fetch_conversation` calls for any conversation
    pub fn fetch_count(&self) -> usize {
        self.count(|c| matches!(c, FakeCall::Fetch { .. }))
    }

    /// Number of `fetch_conversation` calls for `conversation_id`
    pub fn fetch_count_for(&self, conversation_id: &str) -> usize {
        self.count(
            |c| matches!(c, FakeCall::Fetch { conversation_id: id, .. } if id == conversation_id),
        )
    }

    /// Clock readings of every fetch for `conversation_id`
    pub fn fetch_times_for(&self, conversation_id: &str) -> Vec<tokio::time::Instant> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                FakeCall::Fetch {
                    conversation_id: id,
                    at,
                } if id == conversation_id => Some(*at),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&FakeCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(*c)).count()
    }

    fn record(&self, call: FakeCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn stream_message(
        &self,
        _ids: &ConversationIds,
        request: &SendRequest,
    ) -> Result<FrameStream> {
        self.record(FakeCall::Stream(request.clone()));
        if !self.streaming {
            return Err(CoachlineError::StreamingNotSupported.into());
        }

        let frames = self.lock().streams.pop_front().unwrap_or_else(|| {
            vec![Ok(StreamFrame::Done(Message::assistant(format!(
                "ack: {}",
                request.text
            ))))]
        });

        let latency = self.latency;
        let stream = futures::stream::iter(frames).then(move |frame| async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            frame.map_err(|e| anyhow::Error::from(CoachlineError::Stream(e)))
        });
        Ok(Box::pin(stream))
    }

    async fn send_message(&self, _ids: &ConversationIds, request: &SendRequest) -> Result<Message> {
        self.record(FakeCall::Send(request.clone()));
        let scripted = self.lock().sends.pop_front();
        self.delay().await;
        match scripted {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(CoachlineError::Transport(e).into()),
            None => Ok(Message::assistant(format!("ack: {}", request.text))),
        }
    }

    async fn fetch_conversation(&self, ids: &ConversationIds) -> Result<ConversationRecord> {
        self.record(FakeCall::Fetch {
            conversation_id: ids.conversation_id.clone(),
            at: tokio::time::Instant::now(),
        });
        let scripted = {
            let mut state = self.lock();
            state
                .fetches
                .pop_front()
                .or_else(|| state.conversation.clone().map(Ok))
        };
        self.delay().await;
        match scripted {
            Some(Ok(record)) => Ok(record),
            Some(Err(e)) => Err(CoachlineError::Transport(e).into()),
            None => Err(CoachlineError::ConversationNotFound(ids.conversation_id.clone()).into()),
        }
    }

    async fn update_title(&self, _ids: &ConversationIds, title: &str) -> Result<()> {
        self.record(FakeCall::UpdateTitle(title.to_string()));
        self.delay().await;
        Ok(())
    }

    async fn update_mode(&self, _ids: &ConversationIds, mode: &str) -> Result<()> {
        self.record(FakeCall::UpdateMode(mode.to_string()));
        self.delay().await;
        Ok(())
    }

    async fn delete_conversation(&self, ids: &ConversationIds) -> Result<()> {
        self.record(FakeCall::Delete(ids.conversation_id.clone()));
        self.delay().await;
        Ok(())
    }
}
