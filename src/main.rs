//! Feed Connector
//!
//! Records live order books for a basket of symbols across Coinbase,
//! Bitfinex and Bitpanda until interrupted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_connector::{health, Config, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting feed connectors");

    let config = Arc::new(Config::load()?);
    info!(
        basket = ?config.basket,
        max_reconnect_attempts = config.max_reconnect_attempts,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(config.clone(), cancel.clone())?;

    if config.health_port != 0 {
        let statuses = supervisor.statuses();
        let health_cancel = cancel.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(port, statuses, health_cancel).await {
                warn!(error = %e, "Health server error");
            }
        });
    }

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for interrupt");
            return;
        }
        info!("Interrupt received, shutting down");
        interrupt.cancel();
    });

    let reports = supervisor.run().await;
    cancel.cancel();

    for report in &reports {
        info!(
            exchange = %report.exchange,
            symbol = %report.symbol,
            state = %report.state,
            retry_count = report.retry_count,
            repair_count = report.repair_count,
            frames_received = report.frames_received,
            "Connector report"
        );
    }

    info!("Feed connectors stopped");
    Ok(())
}
