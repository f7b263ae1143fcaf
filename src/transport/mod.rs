//! Backend transport abstraction and implementations
//!
//! This module defines the [`ChatTransport`] trait, the minimal contract the
//! synchronization layer needs from the coaching backend. Concrete
//! implementations live in submodules:
//!
//! - [`http::HttpTransport`] -- REST requests plus a Server-Sent-Events
//!   stream for incremental replies.
//! - [`fake::FakeTransport`] -- in-process scripted transport used in tests.
//!
//! # Design
//!
//! The trait never retries. Retry policy, if any, belongs to a concrete
//! transport; callers surface errors as-is.

pub mod fake;
pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::conversation::{Attachment, ConversationIds, ConversationRecord, Message};
use crate::error::{CoachlineError, Result};

pub use fake::{FakeCall, FakeTransport};
pub use http::HttpTransport;

/// One outbound user message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Message text; may be empty when attachments are present
    pub text: String,
    /// Attached media references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Coaching mode the message is sent in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Id of the optimistic local copy, so the backend can echo it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl SendRequest {
    /// Creates a text-only request
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Adds an attachment
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the coaching mode
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// True when there is neither text nor an attachment to send
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

/// One item of an incremental reply
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Next text increment
    Delta(String),
    /// Named processing stage (e.g. "Analyzing your workout...")
    Status(String),
    /// Final, authoritative assistant message
    Done(Message),
}

/// Ordered frames of one streaming exchange
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame>> + Send>>;

/// Contract between the synchronization layer and the backend
///
/// # Examples
///
/// ```no_run
/// use coachline::transport::{ChatTransport, HttpTransport};
///
/// // Implementations are created via their own constructors; this trait is
/// // used polymorphically through `Arc<dyn ChatTransport>`.
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync + std::fmt::Debug {
    /// Whether incremental delivery is available at all
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Opens a streaming exchange for `request`
    ///
    /// The stream yields text increments and ends with a [`StreamFrame::Done`]
    /// frame, or yields an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoachlineError::StreamingNotSupported`] by default.
    async fn stream_message(
        &self,
        _ids: &ConversationIds,
        _request: &SendRequest,
    ) -> Result<FrameStream> {
        Err(CoachlineError::StreamingNotSupported.into())
    }

    /// Sends `request` and returns the assistant reply in one round trip
    async fn send_message(&self, ids: &ConversationIds, request: &SendRequest) -> Result<Message>;

    /// Fetches the current conversation, messages included
    async fn fetch_conversation(&self, ids: &ConversationIds) -> Result<ConversationRecord>;

    /// Renames the conversation
    async fn update_title(&self, ids: &ConversationIds, title: &str) -> Result<()>;

    /// Switches the conversation's coaching mode
    async fn update_mode(&self, ids: &ConversationIds, mode: &str) -> Result<()>;

    /// Deletes the conversation
    async fn delete_conversation(&self, ids: &ConversationIds) -> Result<()>;
}
