//! Message and conversation record types
//!
//! These are the values exchanged with the coaching backend and held in the
//! [`MessageStore`](crate::conversation::MessageStore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metadata key recording which coaching mode produced a message
pub const MODE_METADATA_KEY: &str = "mode";

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the athlete
    User,
    /// Reply produced by the coach
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Opaque reference to an attached media item (usually an image)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// URL, storage key, or `data:` URI identifying the media
    pub reference: String,
    /// MIME type when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Creates an attachment from a bare reference
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            content_type: None,
        }
    }

    /// Sets the MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A single conversation message
///
/// Messages are created locally (optimistic user messages) or received from
/// the transport (assistant replies). The content of an assistant message is
/// only mutated while it is the active streaming target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier, unique within a conversation
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Text body; partial while streaming
    #[serde(default)]
    pub content: String,
    /// Creation time, used for display ordering
    pub timestamp: DateTime<Utc>,
    /// Attached media references, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Open key-value bag (e.g. the mode that produced the message)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates a message with a fresh id and the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use coachline::conversation::{Message, Role};
    ///
    /// let msg = Message::user("Hello, coach!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use coachline::conversation::{Message, Role};
    ///
    /// let msg = Message::assistant("Nice work today.");
    /// assert_eq!(msg.role, Role::Assistant);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Overrides the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Overrides the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Replaces the attachment list
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Records the coaching mode in metadata
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.metadata.insert(
            MODE_METADATA_KEY.to_string(),
            serde_json::Value::String(mode.into()),
        );
        self
    }

    /// Returns the coaching mode recorded in metadata, if any
    pub fn mode(&self) -> Option<&str> {
        self.metadata
            .get(MODE_METADATA_KEY)
            .and_then(|value| value.as_str())
    }
}

/// Generates a locally unique message id
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Identifiers addressing a conversation on the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationIds {
    /// Athlete the conversation belongs to
    pub user_id: String,
    /// Coach the athlete is talking to
    pub coach_id: String,
    /// Conversation identifier
    pub conversation_id: String,
}

impl ConversationIds {
    /// Creates a new id triple
    pub fn new(
        user_id: impl Into<String>,
        coach_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            coach_id: coach_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

impl fmt::Display for ConversationIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.user_id, self.coach_id, self.conversation_id
        )
    }
}

/// Conversation as returned by the backend fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Conversation identifier
    pub conversation_id: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Active coaching mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Messages in whatever order the backend returned them
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Creates an empty record stamped with the current time
    pub fn empty(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            title: String::new(),
            mode: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
