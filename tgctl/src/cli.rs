//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tgctl")]
#[command(about = "Tollgate pay-per-call proxy test client")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Tollgate server URL
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a paid chat completion
    Chat(ChatArgs),
    /// Liveness check
    Health,
    /// Readiness check (configuration and upstream reachability)
    Ready,
    /// Record a payment-response header in the server's transaction log
    LogTransaction {
        /// Base64 `X-PAYMENT-RESPONSE` value
        header: String,
        /// Correlation id to log it under
        #[arg(short = 'r', long)]
        request_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// User message
    pub message: String,

    /// Model name (defaults to `default_model` from config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Optional system prompt sent before the user message
    #[arg(short, long)]
    pub system: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub top_p: Option<f64>,

    /// Base64 `X-PAYMENT` proof
    #[arg(short, long)]
    pub payment: Option<String>,

    /// `X-Request-ID` to send (generated when omitted)
    #[arg(short = 'r', long)]
    pub request_id: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
