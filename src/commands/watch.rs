//! `coachline watch`

use colored::Colorize;

use crate::commands::{connect, open_session, print_message};
use crate::config::Config;
use crate::error::Result;
use crate::sync::{PollOutcome, PollState};

/// Waits for the first reply of `conversation_id` and prints it
///
/// Returns right away when the conversation already has messages.
///
/// # Errors
///
/// Returns an error if the initial load fails. Failed polls are logged and
/// retried until the polling budget runs out.
pub async fn run_watch(config: &Config, conversation_id: &str) -> Result<()> {
    let transport = connect(config)?;
    let mut session = open_session(config, transport, conversation_id);
    session.load().await?;

    if session.poll_state() != PollState::Idle {
        println!(
            "{}",
            format!(
                "Waiting for your coach's first reply (up to {}s)...",
                config.polling.timeout_seconds
            )
            .dimmed()
        );
    }

    let outcome = tokio::select! {
        outcome = session.wait_for_first_reply() => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Stopped waiting.".yellow());
            None
        }
    };
    session.close();

    match outcome {
        Some(PollOutcome::TimedOut) => {
            println!(
                "{}",
                "Still working on it. Check back later with `coachline show`.".yellow()
            );
        }
        Some(PollOutcome::Cancelled) => {}
        Some(PollOutcome::MessagesArrived(_)) | Some(PollOutcome::StoreNotEmpty) | None => {
            for message in session.snapshot().sorted_messages() {
                print_message(message);
            }
        }
    }
    Ok(())
}
