//! Slash commands for interactive chat
//!
//! Lines starting with `/` are handled locally instead of being sent to the
//! coach:
//! - `/title <text>` renames the conversation
//! - `/mode <name>` switches the coaching mode
//! - `/status` shows title, mode and polling state
//! - `/help` lists the commands
//! - `/exit` (or `/quit`) leaves the session
//!
//! Command names are case-insensitive; arguments keep their case.

use thiserror::Error;

/// Errors that can occur when parsing slash commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Commands handled by the chat loop itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Rename the conversation
    Rename(String),
    /// Switch the coaching mode
    SwitchMode(String),
    /// Show conversation status
    ShowStatus,
    /// Show help
    Help,
    /// Leave the session
    Exit,
    /// Not a command; send the line as a message
    None,
}

/// Parse a line of user input
///
/// # Errors
///
/// Returns [`CommandError::UnknownCommand`] for an unrecognised `/word` and
/// [`CommandError::MissingArgument`] when `/title` or `/mode` has no argument.
///
/// # Examples
///
/// ```
/// use coachline::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(
///     parse_special_command("/mode recovery").unwrap(),
///     SpecialCommand::SwitchMode("recovery".to_string())
/// );
/// assert_eq!(parse_special_command("Hi coach").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (name, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (trimmed, ""),
    };

    match name.to_lowercase().as_str() {
        "/title" | "/rename" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/title".to_string(),
                    usage: "/title <new title>".to_string(),
                })
            } else {
                Ok(SpecialCommand::Rename(arg.to_string()))
            }
        }
        "/mode" => {
            if arg.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/mode".to_string(),
                    usage: "/mode <name>".to_string(),
                })
            } else {
                Ok(SpecialCommand::SwitchMode(arg.to_string()))
            }
        }
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(name.to_string())),
    }
}

/// Print the slash command reference
pub fn print_help() {
    println!(
        r#"
Chat commands:
  /title <text>   Rename this conversation
  /mode <name>    Switch coaching mode for the next messages
  /status         Show title, mode and whether a reply is pending
  /help           Show this help
  /exit           Leave the chat (also Ctrl-D)

Anything else is sent to your coach.
"#
    );
}
