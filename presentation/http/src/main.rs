//! Tollgate server binary

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tollgate_server::{init_tracing, LogFormat, ServiceConfig, TollgateServer};
use tracing::{error, info};

/// Pay-per-call proxy for OpenAI-compatible chat completions
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_parser = ["text", "json"])]
    log_format: Option<String>,
}

impl Args {
    fn apply(&self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        match self.log_format.as_deref() {
            Some("json") => config.log_format = LogFormat::Json,
            Some("text") => config.log_format = LogFormat::Text,
            _ => {}
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Tracing is not up yet, so report to stderr directly
    let config = match ServiceConfig::load(args.config.as_deref()) {
        Ok(config) => args.apply(config),
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.log_level, config.log_format) {
        eprintln!("{}", e);
        process::exit(1);
    }

    info!("Starting tollgate {}", env!("CARGO_PKG_VERSION"));

    let server = match TollgateServer::from_config(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialise server: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.serve().await {
        error!("{}", e);
        process::exit(1);
    }
}
