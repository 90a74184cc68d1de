//! VoltWay API Server
//!
//! Run with: cargo run --bin voltway
//!
//! Configuration is read from `--config`, else the first of
//! `~/.config/voltway/config.toml`, `/etc/voltway/config.toml`,
//! `./config.toml`, with `VOLTWAY_*` environment overrides on top.
//! `RUST_LOG` takes precedence over the configured log level.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voltway::api::{serve, AppState};
use voltway::config::{Config, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "voltway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time telemetry hub for the VoltWay charging station")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config loading logs through a bootstrap subscriber; the configured one
    // is only known afterwards
    let config = tracing::subscriber::with_default(
        bootstrap_subscriber(bootstrap_filter(), std::io::stderr),
        || load_config(args),
    )?;

    init_tracing(&config.logging);

    tracing::info!("Starting VoltWay API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        station_id = %config.station.id,
        max_connections = config.hub.max_connections,
        queue_capacity = config.hub.queue_capacity,
        "Station hub configured"
    );

    let state = AppState::new(&config);
    serve(state, &config.api).await?;

    tracing::info!("VoltWay API server stopped");
    Ok(())
}

/// Resolve the config file, environment and CLI overrides
fn load_config(args: Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    Ok(config)
}

fn bootstrap_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voltway=info"))
}

/// Plain subscriber used until the configured one is installed
fn bootstrap_subscriber<W>(filter: EnvFilter, make_writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_ansi(false)
        .finish()
}

/// Initialize tracing from the logging config
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("voltway={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
