//! Network-facing synchronization
//!
//! [`send`] issues user messages (streaming first, one-shot otherwise) and
//! [`poller`] waits for the first reply of freshly created conversations.
//! Both write into a conversation's [`SharedStore`](crate::conversation::SharedStore).

pub mod poller;
pub mod send;

pub use poller::{ConversationPoller, PollOutcome, PollState, PollingConfig};
pub use send::{SendCoordinator, SendHooks, SendOutcome, SendPermit, SendState, SkipReason};
