//! HTTP/SSE transport for the coaching backend
//!
//! This module implements [`HttpTransport`], which talks to the backend's
//! conversation API:
//!
//! - `GET    {base}/users/{user}/coaches/{coach}/conversations/{conv}`
//! - `POST   .../conversations/{conv}/messages` -- one-shot reply as
//!   `{"message": Message}`
//! - `POST   .../conversations/{conv}/messages/stream` -- SSE reply
//! - `PATCH  .../conversations/{conv}` -- `{"title"}` or `{"mode"}`
//! - `DELETE .../conversations/{conv}`
//!
//! # Stream frames
//!
//! Every SSE `data:` payload is a JSON object tagged by `type`:
//!
//! - `{"type":"chunk","content":"..."}` -- text increment
//! - `{"type":"status","content":"..."}` -- contextual status
//! - `{"type":"complete","message":{...}}` -- final message
//! - `{"type":"error","message":"..."}` -- server-side failure
//!
//! `event: ping` blocks, `[PING]` and `[DONE]` payloads are ignored.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use url::Url;

use crate::config::Config;
use crate::conversation::{ConversationIds, ConversationRecord, Message};
use crate::error::{CoachlineError, Result};
use crate::transport::{ChatTransport, FrameStream, SendRequest, StreamFrame};

/// Connect timeout applied to every request, streaming included
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST + SSE implementation of [`ChatTransport`]
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use url::Url;
/// use coachline::transport::HttpTransport;
///
/// let transport = HttpTransport::new(
///     Url::parse("http://localhost:8080/api").unwrap(),
///     None,
///     Duration::from_secs(30),
///     true,
/// )
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
    request_timeout: Duration,
    streaming_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Chunk { content: String },
    Status { content: String },
    Complete { message: Message },
    Error { message: String },
}

impl HttpTransport {
    /// Construct a transport targeting `base_url`
    ///
    /// `request_timeout` bounds each one-shot request. A streaming exchange
    /// may take longer than that in total, but fails once the body stays
    /// silent for `request_timeout` (server pings count as activity).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        auth_token: Option<String>,
        request_timeout: Duration,
        streaming_enabled: bool,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(CoachlineError::Http)?;

        Ok(Self {
            http_client,
            base_url,
            auth_token,
            request_timeout,
            streaming_enabled,
        })
    }

    /// Construct a transport from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `api.base_url` is not a valid URL.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.api.base_url).map_err(|e| {
            CoachlineError::Config(format!("Invalid api.base_url '{}': {}", config.api.base_url, e))
        })?;
        Self::new(
            base_url,
            config.api.auth_token.clone(),
            Duration::from_secs(config.api.request_timeout_seconds),
            config.streaming.enabled,
        )
    }

    fn conversation_url(&self, ids: &ConversationIds, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CoachlineError::Config(format!("Base URL cannot have paths: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend([
                "users",
                ids.user_id.as_str(),
                "coaches",
                ids.coach_id.as_str(),
                "conversations",
                ids.conversation_id.as_str(),
            ])
            .extend(tail);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check_status(
        response: reqwest::Response,
        ids: &ConversationIds,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CoachlineError::ConversationNotFound(ids.conversation_id.clone()).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoachlineError::Transport(format!(
                "{} returned HTTP {}: {}",
                operation,
                status,
                body.trim()
            ))
            .into());
        }
        Ok(response)
    }

    async fn patch(&self, ids: &ConversationIds, body: serde_json::Value) -> Result<()> {
        let url = self.conversation_url(ids, &[])?;
        let response = self
            .request(reqwest::Method::PATCH, url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(CoachlineError::Http)?;
        Self::check_status(response, ids, "update conversation").await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn supports_streaming(&self) -> bool {
        self.streaming_enabled
    }

    async fn stream_message(
        &self,
        ids: &ConversationIds,
        request: &SendRequest,
    ) -> Result<FrameStream> {
        if !self.streaming_enabled {
            return Err(CoachlineError::StreamingNotSupported.into());
        }

        let url = self.conversation_url(ids, &["messages", "stream"])?;
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| CoachlineError::Stream(format!("stream request failed: {}", e)))?;
        let response = Self::check_status(response, ids, "stream message").await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/event-stream") {
            return Err(CoachlineError::Stream(format!(
                "expected text/event-stream, got '{}'",
                content_type
            ))
            .into());
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let byte_stream = response.bytes_stream();
        let idle_timeout = self.request_timeout;
        tokio::spawn(async move {
            parse_sse_stream(byte_stream, frame_tx, idle_timeout).await;
        });

        Ok(Box::pin(UnboundedReceiverStream::new(frame_rx)))
    }

    async fn send_message(&self, ids: &ConversationIds, request: &SendRequest) -> Result<Message> {
        let url = self.conversation_url(ids, &["messages"])?;
        let response = self
            .request(reqwest::Method::POST, url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(CoachlineError::Http)?;
        let response = Self::check_status(response, ids, "send message").await?;
        let body: SendMessageResponse = response.json().await.map_err(CoachlineError::Http)?;
        Ok(body.message)
    }

    async fn fetch_conversation(&self, ids: &ConversationIds) -> Result<ConversationRecord> {
        let url = self.conversation_url(ids, &[])?;
        let response = self
            .request(reqwest::Method::GET, url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(CoachlineError::Http)?;
        let response = Self::check_status(response, ids, "fetch conversation").await?;
        let record: ConversationRecord = response.json().await.map_err(CoachlineError::Http)?;
        Ok(record)
    }

    async fn update_title(&self, ids: &ConversationIds, title: &str) -> Result<()> {
        self.patch(ids, serde_json::json!({ "title": title })).await
    }

    async fn update_mode(&self, ids: &ConversationIds, mode: &str) -> Result<()> {
        self.patch(ids, serde_json::json!({ "mode": mode })).await
    }

    async fn delete_conversation(&self, ids: &ConversationIds) -> Result<()> {
        let url = self.conversation_url(ids, &[])?;
        let response = self
            .request(reqwest::Method::DELETE, url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(CoachlineError::Http)?;
        Self::check_status(response, ids, "delete conversation").await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SSE parser
// ---------------------------------------------------------------------------

/// Parse an SSE byte stream and forward decoded frames to `frame_tx`
///
/// Runs until the byte stream ends, a transport error occurs, the server
/// reports an error frame, no bytes arrive for `idle_timeout`, or the
/// receiver is dropped. Errors are forwarded as the last item.
///
/// # Arguments
///
/// * `byte_stream` - The raw HTTP response body as a stream of byte chunks.
/// * `frame_tx` - Channel receiving decoded frames.
/// * `idle_timeout` - Longest allowed gap between two body chunks.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    frame_tx: mpsc::UnboundedSender<Result<StreamFrame>>,
    idle_timeout: Duration,
) {
    // Raw bytes between event boundaries; decoding waits for a full block
    // so multi-byte characters split across chunks survive.
    let mut buffer: Vec<u8> = Vec::new();

    tokio::pin!(byte_stream);

    loop {
        let chunk_result = match tokio::time::timeout(idle_timeout, byte_stream.next()).await {
            Ok(Some(chunk_result)) => chunk_result,
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(?idle_timeout, "SSE stream went idle");
                let _ = frame_tx.send(Err(CoachlineError::Stream(format!(
                    "no data received for {:?}",
                    idle_timeout
                ))
                .into()));
                return;
            }
        };
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                let _ = frame_tx.send(Err(CoachlineError::Stream(format!(
                    "stream interrupted: {}",
                    e
                ))
                .into()));
                return;
            }
        };

        buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        while let Some(pos) = find_event_boundary(&buffer) {
            let block: Vec<u8> = buffer.drain(..pos + 2).collect();
            let block = String::from_utf8_lossy(&block[..pos]);
            if !forward_event(&block, &frame_tx) {
                return;
            }
        }
    }

    if !buffer.is_empty() {
        let block = String::from_utf8_lossy(&buffer).to_string();
        forward_event(&block, &frame_tx);
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Decode one event block and forward it; returns false when parsing must stop
fn forward_event(block: &str, frame_tx: &mpsc::UnboundedSender<Result<StreamFrame>>) -> bool {
    match decode_event(block) {
        Ok(Some(frame)) => frame_tx.send(Ok(frame)).is_ok(),
        Ok(None) => true,
        Err(e) => {
            let _ = frame_tx.send(Err(e));
            false
        }
    }
}

/// Decode a single SSE event block into a frame
///
/// Returns `Ok(None)` for comments, pings, and empty or sentinel payloads.
pub fn decode_event(block: &str) -> Result<Option<StreamFrame>> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_type: Option<&str> = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        }
        // `id:`, `retry:` and `:` comments carry nothing we use.
    }

    if event_type.is_some_and(|et| et.eq_ignore_ascii_case("ping")) {
        return Ok(None);
    }

    let data = data_lines.join("\n");
    let trimmed = data.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("[ping]")
        || trimmed.eq_ignore_ascii_case("[done]")
    {
        return Ok(None);
    }

    let frame: WireFrame = serde_json::from_str(trimmed)
        .map_err(|e| CoachlineError::Stream(format!("malformed stream frame: {}", e)))?;

    match frame {
        WireFrame::Chunk { content } => Ok(Some(StreamFrame::Delta(content))),
        WireFrame::Status { content } => Ok(Some(StreamFrame::Status(content))),
        WireFrame::Complete { message } => Ok(Some(StreamFrame::Done(message))),
        WireFrame::Error { message } => Err(CoachlineError::Stream(message).into()),
    }
}
