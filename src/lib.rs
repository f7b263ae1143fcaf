//! Coachline - client-side message synchronization for coaching conversations
//!
//! This library keeps a local view of one coaching conversation consistent
//! with the backend while replies stream in token by token, arrive in one
//! round trip, or show up later through polling.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `conversation`: message model, message store, streaming and typing derivations
//! - `transport`: backend contract plus HTTP/SSE and in-process implementations
//! - `sync`: send coordination and first-reply polling
//! - `session`: per-conversation lifecycle tying the above together
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coachline::transport::HttpTransport;
//! use coachline::{Config, ConversationSession, SendHooks, SendRequest, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/coachline.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let transport = Arc::new(HttpTransport::from_config(&config)?);
//!     let ids = coachline::commands::conversation_ids(&config, "conv-1");
//!     let mut session = ConversationSession::new(transport, ids, SessionOptions::from_config(&config));
//!     session.load().await?;
//!     session.send(SendRequest::text("How should I pace my long run?"), SendHooks::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod session;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{ConversationIds, ConversationState, Message, MessageStore, Role, StoreEvent};
pub use error::{CoachlineError, Result};
pub use session::{ConversationSession, SessionManager, SessionOptions};
pub use sync::{ConversationPoller, SendCoordinator, SendHooks, SendOutcome};
pub use transport::{ChatTransport, SendRequest};

#[cfg(test)]
pub mod test_utils;
