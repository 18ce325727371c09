//! Tower Agent CLI Entry Point
//!
//! This is the main entry point for the Tower Agent binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tw_agent::agent::session::AgentSession;
use tw_agent::agent::supervisor::{supervise, Exit, Supervisor, FAILURE_EXIT_CODE};
use tw_agent::cli::config::{
    require_access_token, Config, LogFormat, LoggingConfig, DEFAULT_API_ENDPOINT,
};
use tw_agent::connection::websocket::WebSocketConnector;

#[derive(Parser)]
#[command(name = "tw-agent")]
#[command(author, version, about = "Nextflow Tower Agent")]
struct Cli {
    /// Agent connection ID to identify this agent
    #[arg(value_name = "AGENT_CONNECTION_ID")]
    connection_id: String,

    /// Tower personal access token
    #[arg(short = 't', long = "access-token", env = "TOWER_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Tower server API endpoint URL
    #[arg(short, long, env = "TOWER_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    url: String,

    /// Path to an optional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = parse_exit_code(&e);
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = start_agent(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(FAILURE_EXIT_CODE);
    }
}

async fn start_agent(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_ref())?;
    init_logging(&config.logging, cli.verbose)?;

    let credential = require_access_token(cli.access_token)?;

    info!(
        connection_id = %cli.connection_id,
        url = %cli.url,
        heartbeat_secs = config.connection.heartbeat_interval_secs,
        "Starting Tower Agent"
    );

    let session = AgentSession::new(cli.connection_id, credential, cli.url);
    let supervisor = Supervisor::new(
        WebSocketConnector::new(config.connection.connect_timeout()),
        config.connection.heartbeat_interval(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };

    let exit: Exit = supervise(supervisor, session, shutdown).await;
    exit.terminate()
}

/// `--help` and `--version` exit 0; any usage error is a failure.
fn parse_exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        FAILURE_EXIT_CODE
    } else {
        0
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish()),
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("Failed to install logger")
}
