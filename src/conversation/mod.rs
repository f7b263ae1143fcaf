//! Conversation data model and derived display state
//!
//! - [`message`]: messages, attachments, and backend conversation records
//! - [`store`]: the per-conversation message store and its event type
//! - [`reconciler`]: pure per-message streaming derivations
//! - [`typing`]: typing indicator resolution

pub mod message;
pub mod reconciler;
pub mod store;
pub mod typing;

pub use message::{
    new_message_id, Attachment, ConversationIds, ConversationRecord, Message, Role,
    MODE_METADATA_KEY,
};
pub use reconciler::{display_content, is_message_streaming, visual_streaming_class, StreamingStyle};
pub use store::{ConversationState, MessageStore, SharedStore, StoreEvent};
pub use typing::{should_show_typing_indicator, TypingIndicator, TypingStateResolver};
