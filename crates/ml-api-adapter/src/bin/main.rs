//! ml-api-adapter entry point
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP service
//! ml-api-adapter serve --config adapter.yaml --port 3000
//!
//! # Check a request offline
//! ml-api-adapter validate --headers headers.json --body body.json
//!
//! # Print the effective configuration
//! ml-api-adapter config --config adapter.yaml
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Request rejected by the schema (`validate`) or startup failure

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ml_api_adapter::{AdapterService, CommandHeaders, SchemaValidator, ServiceConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ml-api-adapter")]
#[command(about = "Transfer prepare adapter - validates transfer requests and publishes PrepareTransfer events")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "json", env = "LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Configuration file (YAML or TOML)
        #[arg(short, long, env = "ML_CONFIG")]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate a request offline
    Validate {
        /// Headers as a JSON or YAML object of strings
        #[arg(long)]
        headers: PathBuf,

        /// Request body (JSON)
        #[arg(long)]
        body: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file (YAML or TOML)
        #[arg(short, long, env = "ML_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

fn read_headers(path: &Path) -> anyhow::Result<CommandHeaders> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading headers from {}", path.display()))?;
    let map: BTreeMap<String, String> = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing headers from {}", path.display()))?;
    Ok(map.into_iter().collect())
}

fn read_body(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading body from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing body from {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let service = AdapterService::from_config(config).context("building service")?;
    service.init().await.context("initializing dependencies")?;

    let addr = service.config().bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        address = %addr,
        base_path = %service.config().base_path(),
        topic = %service.settings().position_cmds_topic,
        version = ml_api_adapter::ADAPTER_VERSION,
        "Starting ml-api-adapter"
    );

    axum::serve(listener, service.router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await?;
    tracing::info!("ml-api-adapter stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = ServiceConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await?;
        }

        Commands::Validate { headers, body } => {
            let headers = read_headers(&headers)?;
            let body = read_body(&body)?;

            match SchemaValidator::new().validate(&headers, &body) {
                Ok(command) => println!("{}", serde_json::to_string_pretty(&command)?),
                Err(e) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "valid": false,
                            "error": e.to_string(),
                            "violations": e.violations(),
                        }))?
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { config } => {
            let config = ServiceConfig::load(config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
