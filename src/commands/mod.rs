/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `show`: print a transcript
- `send`: send one message, streaming the reply
- `chat`: interactive conversation
- `watch`: wait for the first reply of a new conversation
- `manage`: rename, switch mode, delete

Handlers stay thin: they build a [`ConversationSession`] over an HTTP
transport and render what the session's store holds.
*/

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use prettytable::{format, row, Table};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::conversation::{
    ConversationIds, ConversationState, Message, Role, StoreEvent, TypingIndicator,
};
use crate::error::Result;
use crate::session::{ConversationSession, SessionOptions};
use crate::sync::{SendHooks, SendOutcome, SkipReason};
use crate::transport::{ChatTransport, HttpTransport, SendRequest};

pub mod attachments;
pub mod chat;
pub mod manage;
pub mod send;
pub mod show;
pub mod special_commands;
pub mod watch;

/// Builds the HTTP transport described by `config`
///
/// # Errors
///
/// Returns an error if the athlete or coach id is missing or the HTTP
/// client cannot be built.
pub fn connect(config: &Config) -> Result<Arc<dyn ChatTransport>> {
    config.require_identity()?;
    Ok(Arc::new(HttpTransport::from_config(config)?))
}

/// Full identifiers of `conversation_id` for the configured athlete and coach
pub fn conversation_ids(config: &Config, conversation_id: &str) -> ConversationIds {
    ConversationIds::new(
        config.api.user_id.clone(),
        config.api.coach_id.clone(),
        conversation_id,
    )
}

/// Opens a session for `conversation_id` over `transport`
pub fn open_session(
    config: &Config,
    transport: Arc<dyn ChatTransport>,
    conversation_id: &str,
) -> ConversationSession {
    ConversationSession::new(
        transport,
        conversation_ids(config, conversation_id),
        SessionOptions::from_config(config),
    )
}

/// Renders the sorted transcript as a table
pub fn transcript_table(state: &ConversationState) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.set_titles(row!["Time".bold(), "From".bold(), "Message".bold()]);

    for message in state.sorted_messages() {
        let time = message.timestamp.format("%Y-%m-%d %H:%M").to_string();
        table.add_row(row![time, role_label(message.role), message_body(message)]);
    }
    table
}

fn role_label(role: Role) -> colored::ColoredString {
    match role {
        Role::User => "you".cyan(),
        Role::Assistant => "coach".green(),
    }
}

fn message_body(message: &Message) -> String {
    if message.attachments.is_empty() {
        message.content.clone()
    } else {
        format!(
            "{}\n[{} attachment(s)]",
            message.content,
            message.attachments.len()
        )
    }
}

/// Prints one message on its own line
pub fn print_message(message: &Message) {
    println!("{} {}", format!("{}:", role_label(message.role)).bold(), message_body(message));
}

/// Prints messages whose ids are not in `shown`, in display order
pub fn print_unseen(state: &ConversationState, shown: &mut HashSet<String>) {
    for message in state.sorted_messages() {
        if shown.insert(message.id.clone()) {
            print_message(message);
        }
    }
}

/// Sends `request` through `session`, echoing streamed text as it arrives
///
/// Returns the assistant reply, or `None` when the send was skipped.
///
/// # Errors
///
/// Returns the transport error of a failed exchange.
pub async fn send_and_render(
    session: &mut ConversationSession,
    request: SendRequest,
) -> Result<Option<Message>> {
    let mut events = session.store().subscribe();
    let mut streamed = false;

    // failures come back as the error below; callers report them once
    let hooks = SendHooks::new();

    let outcome = {
        let send = session.send(request, hooks);
        tokio::pin!(send);
        loop {
            tokio::select! {
                result = &mut send => break result?,
                event = events.recv() => match event {
                    Ok(event) => render_event(&event, &mut streamed),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Render lagged behind store events");
                    }
                    Err(RecvError::Closed) => {}
                },
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        render_event(&event, &mut streamed);
    }

    match outcome {
        SendOutcome::Sent(reply) => {
            if streamed {
                println!();
            } else {
                print_message(&reply);
            }
            Ok(Some(reply))
        }
        SendOutcome::Skipped(SkipReason::Empty) => {
            println!("{}", "Nothing to send.".yellow());
            Ok(None)
        }
        SendOutcome::Skipped(SkipReason::InFlight) => {
            println!("{}", "A message is already on its way.".yellow());
            Ok(None)
        }
    }
}

fn render_event(event: &StoreEvent, streamed: &mut bool) {
    match event {
        StoreEvent::StreamToken(text) => {
            if !*streamed {
                print!("{} ", format!("{}:", role_label(Role::Assistant)).bold());
                *streamed = true;
            }
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        StoreEvent::ContextualStatusChanged(Some(status)) if !*streamed => {
            eprintln!("{}", status.dimmed());
        }
        _ => {}
    }
}

/// One-line description of a typing indicator
pub fn describe_indicator(indicator: &TypingIndicator) -> Option<String> {
    match indicator {
        TypingIndicator::Hidden => None,
        TypingIndicator::Generic => Some("Coach is typing...".to_string()),
        TypingIndicator::Contextual(status) => Some(status.clone()),
    }
}
