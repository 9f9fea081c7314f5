//! Command-line test client for Tollgate

use clap::Parser;
use std::process;
use tracing::{error, info, Level};

mod cli;
mod client;
mod commands;
mod config;
mod output;

use cli::*;
use config::TgctlConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = match TgctlConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // Override config with CLI args
    let config = config.with_overrides(&args);

    info!("Starting tgctl with endpoint: {}", config.endpoint);

    let result = match args.command {
        Commands::Chat(chat) => commands::chat::handle_chat_command(chat, &config).await,
        Commands::Health => commands::health::handle_health_command(&config).await,
        Commands::Ready => commands::health::handle_ready_command(&config).await,
        Commands::LogTransaction { header, request_id } => {
            commands::transaction::handle_log_transaction_command(header, request_id, &config).await
        }
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}
