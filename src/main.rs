//! Coachline - terminal client for coaching conversations
//!
#![doc = "Main entry point for the Coachline application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coachline::cli::{Cli, Commands};
use coachline::commands;
use coachline::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/coachline.yaml");
    let config = Config::load(config_path, &cli)?;

    // Initialize tracing once the log settings are known
    init_tracing(&config.logging);

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Show { conversation, json } => {
            tracing::debug!("Showing conversation {}", conversation);
            commands::show::show_conversation(&config, &conversation, json).await?;
        }
        Commands::Send {
            conversation,
            attach,
            mode,
            no_stream,
            text,
        } => {
            tracing::info!("Sending message to conversation {}", conversation);
            if no_stream {
                tracing::debug!("Streaming disabled for this send");
            }
            let args = commands::send::SendArgs {
                conversation,
                text,
                attach,
                mode,
                no_stream,
            };
            commands::send::run_send(&config, args).await?;
        }
        Commands::Chat { conversation } => {
            tracing::info!("Starting interactive chat mode");
            commands::chat::run_chat(&config, &conversation).await?;
        }
        Commands::Watch { conversation } => {
            tracing::info!("Watching conversation {} for its first reply", conversation);
            commands::watch::run_watch(&config, &conversation).await?;
        }
        Commands::Rename {
            conversation,
            title,
        } => {
            commands::manage::rename_conversation(&config, &conversation, &title).await?;
        }
        Commands::Mode { conversation, mode } => {
            commands::manage::switch_mode(&config, &conversation, &mode).await?;
        }
        Commands::Delete { conversation, yes } => {
            commands::manage::delete_conversation(&config, &conversation, yes).await?;
        }
    }
    Ok(())
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("coachline={}", logging.level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
