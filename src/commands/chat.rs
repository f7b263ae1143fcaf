//! Interactive chat mode handler
//!
//! Loads the conversation, prints the transcript so far, then runs a
//! readline loop. Each line is either a slash command or a message for the
//! coach. Replies that arrive through first-reply polling while the user is
//! typing are printed before the next prompt.

use std::collections::HashSet;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::commands::{
    connect, describe_indicator, open_session, print_unseen, send_and_render,
};
use crate::config::Config;
use crate::error::Result;
use crate::session::ConversationSession;
use crate::sync::PollState;
use crate::transport::SendRequest;

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Global configuration
/// * `conversation_id` - Conversation to open
///
/// # Errors
///
/// Returns an error if the conversation cannot be loaded or the terminal
/// cannot be initialised. Failed sends are reported and the loop continues.
pub async fn run_chat(config: &Config, conversation_id: &str) -> Result<()> {
    let transport = connect(config)?;
    let mut session = open_session(config, transport, conversation_id);
    let record = session.load().await?;

    let mut rl = DefaultEditor::new()?;
    let mut shown = HashSet::new();

    print_welcome_banner(&session, &record.title);
    print_unseen(&session.snapshot(), &mut shown);
    if session.poll_state() != PollState::Idle {
        println!("{}", "Your coach is preparing a first message...".dimmed());
    }

    loop {
        print_unseen(&session.snapshot(), &mut shown);

        let prompt = format_prompt(session.mode());
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                match parse_special_command(trimmed) {
                    Ok(SpecialCommand::None) => {}
                    Ok(SpecialCommand::Exit) => break,
                    Ok(command) => {
                        handle_command(&mut session, command).await;
                        continue;
                    }
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                }

                if let Err(e) = send_and_render(&mut session, SendRequest::text(trimmed)).await {
                    eprintln!("{}", format!("Error: {:#}", e).red());
                }
                // the exchange was printed as it happened
                for message in &session.snapshot().messages {
                    shown.insert(message.id.clone());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    session.close();
    println!("Goodbye!");
    Ok(())
}

async fn handle_command(session: &mut ConversationSession, command: SpecialCommand) {
    let result = match command {
        SpecialCommand::Rename(title) => session
            .update_title(&title)
            .await
            .map(|_| format!("Renamed to \"{}\"", title)),
        SpecialCommand::SwitchMode(mode) => session
            .update_mode(&mode)
            .await
            .map(|_| format!("Switched to {} mode", mode)),
        SpecialCommand::ShowStatus => {
            print_status(session);
            return;
        }
        SpecialCommand::Help => {
            print_help();
            return;
        }
        SpecialCommand::Exit | SpecialCommand::None => return,
    };

    match result {
        Ok(message) => println!("{}", message.green()),
        Err(e) => eprintln!("{}", format!("Error: {:#}", e).red()),
    }
}

fn format_prompt(mode: Option<&str>) -> String {
    match mode {
        Some(mode) => format!("[{}] >> ", mode),
        None => ">> ".to_string(),
    }
}

fn print_welcome_banner(session: &ConversationSession, title: &str) {
    println!();
    println!("{}", "Coachline".bold());
    println!(
        "Conversation: {}",
        (if title.is_empty() { "(untitled)" } else { title }).cyan()
    );
    if let Some(mode) = session.mode() {
        println!("Mode:         {}", mode.cyan());
    }
    println!("Type {} for commands.", "/help".cyan());
    println!();
}

fn print_status(session: &ConversationSession) {
    println!();
    println!("Conversation: {}", session.ids());
    println!(
        "Title:        {}",
        if session.title().is_empty() {
            "(untitled)"
        } else {
            session.title()
        }
    );
    println!("Mode:         {}", session.mode().unwrap_or("-"));
    println!("Messages:     {}", session.store().message_count());
    let polling = match session.poll_state() {
        PollState::Idle => "no".to_string(),
        PollState::Polling { started_at, .. } => {
            format!("yes ({}s so far)", started_at.elapsed().as_secs())
        }
    };
    println!("Awaiting first reply: {}", polling);
    if let Some(indicator) = describe_indicator(&session.typing_indicator()) {
        println!("{}", indicator.dimmed());
    }
    println!();
}
