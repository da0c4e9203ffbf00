//! Pulse Daemon - APM health telemetry aggregator
//!
//! Pulls health data from the monitoring provider, accepts webhook events,
//! answers chat questions and pushes live updates to dashboard clients.

use anyhow::Result;
use clap::Parser;
use pulsed::aggregator::DataSource;
use pulsed::config::Config;
use pulsed::server::{self, AppState};
use pulsed::scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "pulsed")]
#[command(about = "Pulse - APM health telemetry aggregator", long_about = None)]
#[command(version = pulse_shared::VERSION)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Pulse Daemon v{} starting", pulse_shared::VERSION);

    let config = Config::load(cli.config.as_deref())?;
    let source = DataSource::select(&config.provider);

    let state = Arc::new(AppState::new(config, source)?);
    let jobs = scheduler::spawn(
        Arc::clone(&state.aggregator),
        state.broadcaster.clone(),
        &state.config.schedule,
    );

    let result = tokio::select! {
        result = server::run(Arc::clone(&state)) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
            Ok(())
        }
    };
    jobs.abort();
    result
}
