//! `coachline show`

use colored::Colorize;

use crate::commands::{connect, open_session, transcript_table};
use crate::config::Config;
use crate::error::Result;

/// Prints the transcript of `conversation_id`
///
/// # Errors
///
/// Returns an error if the conversation cannot be fetched.
pub async fn show_conversation(config: &Config, conversation_id: &str, json: bool) -> Result<()> {
    let transport = connect(config)?;
    let mut session = open_session(config, transport, conversation_id);
    let record = session.load().await?;
    // a one-shot view never waits for a reply
    session.close();

    let state = session.snapshot();
    if json {
        let sorted = state.sorted_messages();
        println!("{}", serde_json::to_string_pretty(&sorted)?);
        return Ok(());
    }

    let title = if record.title.is_empty() {
        "(untitled)".to_string()
    } else {
        record.title.clone()
    };
    println!();
    print!("{}", title.bold());
    if let Some(mode) = &record.mode {
        print!("  {}", format!("[{}]", mode).cyan());
    }
    println!();

    if state.messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
        println!(
            "Use {} to wait for the first reply.",
            format!("coachline watch --conversation {}", conversation_id).cyan()
        );
        return Ok(());
    }

    transcript_table(&state).printstd();
    println!();
    Ok(())
}
