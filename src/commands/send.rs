//! `coachline send`

use std::path::PathBuf;

use colored::Colorize;

use crate::commands::attachments::load_attachments;
use crate::commands::{connect, conversation_ids, send_and_render};
use crate::config::Config;
use crate::error::Result;
use crate::session::{ConversationSession, SessionOptions};
use crate::transport::SendRequest;

/// Arguments of the `send` command
#[derive(Debug, Clone, Default)]
pub struct SendArgs {
    /// Conversation id
    pub conversation: String,
    /// Message text
    pub text: Option<String>,
    /// Files to attach
    pub attach: Vec<PathBuf>,
    /// Coaching mode for this message
    pub mode: Option<String>,
    /// Force a one-shot request
    pub no_stream: bool,
}

/// Sends one message and prints the reply
///
/// # Errors
///
/// Returns an error if an attachment cannot be read, the conversation
/// cannot be loaded, or the send fails.
pub async fn run_send(config: &Config, args: SendArgs) -> Result<()> {
    let attachments = load_attachments(&args.attach)?;
    let mut request = SendRequest::text(args.text.unwrap_or_default());
    request.attachments = attachments;
    request.mode = args.mode;

    if request.is_empty() {
        println!("{}", "Nothing to send: give a message or --attach a file.".yellow());
        return Ok(());
    }

    let mut options = SessionOptions::from_config(config);
    if args.no_stream {
        options.enable_streaming = false;
    }

    let transport = connect(config)?;
    let ids = conversation_ids(config, &args.conversation);
    let mut session = ConversationSession::new(transport, ids, options);
    session.load().await?;

    let reply = send_and_render(&mut session, request).await;
    session.close();
    reply?;
    Ok(())
}
