//! Pure derivation of per-message display state
//!
//! Given a message and the conversation state, these functions decide what
//! text to show and whether the message should be rendered as streaming.
//! Nothing here mutates; callers can re-derive on every repaint.

use std::collections::BTreeSet;

use crate::conversation::message::Message;
use crate::conversation::store::ConversationState;

/// Advisory style tags for a message bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamingStyle {
    /// Message is the active streaming target
    Streaming,
    /// Partial content is visible and still growing
    Cursor,
}

/// Returns true iff `message` is the active streaming target
///
/// # Examples
///
/// ```
/// use coachline::conversation::{is_message_streaming, Message, MessageStore};
///
/// let mut store = MessageStore::new();
/// let msg = Message::assistant("").with_id("m1");
/// store.append_message(msg.clone());
/// assert!(!is_message_streaming(&msg, store.state()));
///
/// store.begin_streaming("m1");
/// assert!(is_message_streaming(&msg, store.state()));
/// ```
pub fn is_message_streaming(message: &Message, state: &ConversationState) -> bool {
    state.is_streaming && state.streaming_message_id.as_deref() == Some(message.id.as_str())
}

/// Text to render for `message`
///
/// A streaming message shows the buffer, or its stored content while the
/// buffer is still empty. Everything else shows its stored content.
pub fn display_content<'a>(message: &'a Message, state: &'a ConversationState) -> &'a str {
    if is_message_streaming(message, state) && !state.streaming_buffer.is_empty() {
        &state.streaming_buffer
    } else {
        &message.content
    }
}

/// Style tags for `message`; empty when it is not streaming
pub fn visual_streaming_class(
    message: &Message,
    state: &ConversationState,
) -> BTreeSet<StreamingStyle> {
    let mut tags = BTreeSet::new();
    if is_message_streaming(message, state) {
        tags.insert(StreamingStyle::Streaming);
        if !state.streaming_buffer.is_empty() {
            tags.insert(StreamingStyle::Cursor);
        }
    }
    tags
}
