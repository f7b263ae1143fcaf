//! `coachline rename`, `coachline mode`, `coachline delete`

use std::io::{BufRead, Write};

use colored::Colorize;

use crate::commands::{connect, open_session};
use crate::config::Config;
use crate::error::Result;

/// Renames `conversation_id`
///
/// # Errors
///
/// Returns the transport error if the update fails.
pub async fn rename_conversation(config: &Config, conversation_id: &str, title: &str) -> Result<()> {
    let transport = connect(config)?;
    let mut session = open_session(config, transport, conversation_id);
    session.update_title(title).await?;
    println!("{}", format!("Renamed conversation to \"{}\"", title).green());
    Ok(())
}

/// Switches the coaching mode of `conversation_id`
///
/// # Errors
///
/// Returns the transport error if the update fails.
pub async fn switch_mode(config: &Config, conversation_id: &str, mode: &str) -> Result<()> {
    let transport = connect(config)?;
    let mut session = open_session(config, transport, conversation_id);
    session.update_mode(mode).await?;
    println!("{}", format!("Switched to {} mode", mode).green());
    Ok(())
}

/// Deletes `conversation_id`, asking first unless `yes` is set
///
/// # Errors
///
/// Returns the transport error if the deletion fails.
pub async fn delete_conversation(config: &Config, conversation_id: &str, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete conversation {}?", conversation_id))? {
        println!("Aborted.");
        return Ok(());
    }

    let transport = connect(config)?;
    let session = open_session(config, transport, conversation_id);
    session.delete().await?;
    println!("{}", format!("Deleted conversation {}", conversation_id).green());
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
