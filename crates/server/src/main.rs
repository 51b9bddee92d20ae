use std::time::Duration;

use anyhow::Result;
use callbrief_core::config::{AppConfig, LoadOptions};
use callbrief_server::{bootstrap_with_config, router};

fn init_logging(config: &AppConfig) {
    use callbrief_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Validation is deferred to bootstrap so an invalid config still serves /health.
    let config = AppConfig::load_unvalidated(LoadOptions::default())?;
    init_logging(&config);

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    let state = bootstrap_with_config(config).await?;
    let ready = state.readiness.is_ready();

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        ready,
        "callbrief-server listening"
    );

    let in_flight = state.in_flight.clone();
    axum::serve(listener, router(state)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        in_flight = in_flight.count(),
        grace_secs = grace.as_secs(),
        "callbrief-server stopping"
    );
    if !in_flight.drain(grace).await {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            abandoned = in_flight.count(),
            "calls still processing when the grace period ended"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
