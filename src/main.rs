//! tailgate - fleet access-log aggregator
//!
//! ## Usage
//!
//! ```bash
//! # Tail two hosts, serve hits on the default port
//! TAILGATE_HOSTS="web1:/var/log/nginx/access.log,web2:/var/log/nginx/access.log" cargo run
//!
//! # Or point at a TOML file describing the fleet
//! TAILGATE_CONFIG=tailgate.toml cargo run
//! ```
//!
//! ## Environment Variables
//!
//! - `TAILGATE_CONFIG`: path to a TOML configuration file
//! - `TAILGATE_LISTEN_ADDR`: HTTP listen address (default: "0.0.0.0:8040")
//! - `TAILGATE_HOSTS`: comma-separated `host[?key]:file` specs
//! - `TAILGATE_RETENTION_SECS`: sliding window size (default: 30)
//! - `TAILGATE_LOOKBACK_SECS`: default poll lookback (default: 10)
//! - `TAILGATE_RECONNECT_SECS`: reconnect delay; unset means never
//! - `TAILGATE_LOG_LEVEL`: log level (default: "info")
//! - `TAILGATE_LOG_FORMAT`: "json" or "pretty" (default: "pretty")

use std::sync::Arc;
use tailgate::buffer::SlidingBuffer;
use tailgate::config::{Config, LogFormat};
use tailgate::metrics::Metrics;
use tailgate::normalize::NormalizeRules;
use tailgate::server::{self, AppState};
use tailgate::source::SshTail;
use tailgate::worker::IngestWorker;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config);

    info!(
        listen_addr = %config.listen_addr,
        hosts = config.hosts.len(),
        retention_secs = config.retention_window_secs,
        "Starting tailgate"
    );

    if let Err(e) = Metrics::init() {
        warn!(error = %e, "Metrics unavailable");
    }

    if config.hosts.is_empty() {
        warn!("No hosts configured - the poll endpoint will serve an empty window");
    }

    let buffer = Arc::new(SlidingBuffer::new(config.retention_window()));

    for host in &config.hosts {
        let rules = Arc::new(NormalizeRules::compile(config.normalize_for(host))?);
        let worker = IngestWorker::new(&host.host, rules, Arc::clone(&buffer))
            .with_restart(config.restart_policy());

        let host = host.clone();
        tokio::spawn(async move { worker.run(move || SshTail::connect(&host)).await });
    }

    let state = AppState {
        buffer,
        default_lookback: config.default_lookback_secs,
    };

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Poll endpoint listening");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tailgate shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
