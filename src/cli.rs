//! Command-line interface definition for Coachline
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to read, send to, watch, and manage coaching
//! conversations.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coachline - terminal client for coaching conversations
///
/// Streams assistant replies as they are written and waits for the first
/// reply of freshly created conversations.
#[derive(Parser, Debug, Clone)]
#[command(name = "coachline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/coachline.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override the athlete id
    #[arg(long)]
    pub user: Option<String>,

    /// Override the coach id
    #[arg(long)]
    pub coach: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Coachline
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the conversation transcript
    Show {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// Print the transcript as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Send one message and print the reply
    Send {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// File to attach (repeatable)
        #[arg(short, long = "attach")]
        attach: Vec<PathBuf>,

        /// Coaching mode for this message
        #[arg(short, long)]
        mode: Option<String>,

        /// Use a one-shot request even when streaming is available
        #[arg(long)]
        no_stream: bool,

        /// Message text
        text: Option<String>,
    },

    /// Start an interactive conversation
    Chat {
        /// Conversation id
        #[arg(long)]
        conversation: String,
    },

    /// Wait for the first reply of a new conversation
    Watch {
        /// Conversation id
        #[arg(long)]
        conversation: String,
    },

    /// Rename a conversation
    Rename {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// New title
        title: String,
    },

    /// Switch a conversation's coaching mode
    Mode {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// New mode
        mode: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id
        #[arg(long)]
        conversation: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/coachline.yaml".to_string()),
            verbose: false,
            json_logs: false,
            base_url: None,
            user: None,
            coach: None,
            command: Commands::Show {
                conversation: String::new(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/coachline.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Show { .. }));
    }

    #[test]
    fn test_cli_parse_show() {
        let cli = Cli::try_parse_from(["coachline", "show", "--conversation", "conv1"]).unwrap();
        if let Commands::Show { conversation, json } = cli.command {
            assert_eq!(conversation, "conv1");
            assert!(!json);
        } else {
            panic!("Expected Show command");
        }
    }

    #[test]
    fn test_cli_parse_send_with_attachments() {
        let cli = Cli::try_parse_from([
            "coachline",
            "send",
            "--conversation",
            "conv1",
            "--attach",
            "splits.png",
            "-a",
            "hr.png",
            "--no-stream",
            "How did I do?",
        ])
        .unwrap();

        if let Commands::Send {
            conversation,
            attach,
            mode,
            no_stream,
            text,
        } = cli.command
        {
            assert_eq!(conversation, "conv1");
            assert_eq!(
                attach,
                vec![PathBuf::from("splits.png"), PathBuf::from("hr.png")]
            );
            assert!(mode.is_none());
            assert!(no_stream);
            assert_eq!(text, Some("How did I do?".to_string()));
        } else {
            panic!("Expected Send command");
        }
    }

    #[test]
    fn test_cli_parse_send_attachment_only() {
        let cli = Cli::try_parse_from([
            "coachline",
            "send",
            "--conversation",
            "conv1",
            "--attach",
            "plan.pdf",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Send { text: None, .. }));
    }

    #[test]
    fn test_cli_parse_rename_and_mode() {
        let cli =
            Cli::try_parse_from(["coachline", "rename", "--conversation", "c", "Race week"])
                .unwrap();
        assert!(
            matches!(cli.command, Commands::Rename { ref title, .. } if title == "Race week")
        );

        let cli =
            Cli::try_parse_from(["coachline", "mode", "--conversation", "c", "recovery"]).unwrap();
        assert!(matches!(cli.command, Commands::Mode { ref mode, .. } if mode == "recovery"));
    }

    #[test]
    fn test_cli_parse_delete_with_yes() {
        let cli =
            Cli::try_parse_from(["coachline", "delete", "--conversation", "c", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { yes: true, .. }));
    }

    #[test]
    fn test_cli_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "coachline",
            "--config",
            "custom.yaml",
            "-v",
            "--user",
            "athlete-1",
            "--coach",
            "coach-1",
            "--base-url",
            "http://localhost:9999",
            "watch",
            "--conversation",
            "conv1",
        ])
        .unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
        assert!(cli.verbose);
        assert_eq!(cli.user.as_deref(), Some("athlete-1"));
        assert_eq!(cli.coach.as_deref(), Some("coach-1"));
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:9999"));
        assert!(matches!(cli.command, Commands::Watch { .. }));
    }

    #[test]
    fn test_cli_parse_missing_conversation() {
        assert!(Cli::try_parse_from(["coachline", "chat"]).is_err());
    }

    #[test]
    fn test_cli_parse_missing_command() {
        assert!(Cli::try_parse_from(["coachline"]).is_err());
    }

    #[test]
    fn test_cli_parse_invalid_command() {
        assert!(Cli::try_parse_from(["coachline", "invalid"]).is_err());
    }
}
