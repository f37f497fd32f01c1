//! Health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::connector::ConnectorStatus;
use crate::error::{MarketDataError, Result};

#[derive(Clone)]
struct HealthState {
    statuses: Arc<[Arc<ConnectorStatus>]>,
}

/// `/health` and `/metrics` over the given connectors
pub fn router(statuses: Vec<Arc<ConnectorStatus>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(HealthState {
            statuses: statuses.into(),
        })
}

/// Serve the health endpoints until `cancel` fires
pub async fn serve(
    port: u16,
    statuses: Vec<Arc<ConnectorStatus>>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(statuses))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

/// Overall status plus one report per connector. A stalled connector makes
/// the process `degraded`, not unhealthy: its siblings keep recording.
pub fn health_report(statuses: &[Arc<ConnectorStatus>]) -> Value {
    let reports: Vec<_> = statuses.iter().map(|status| status.report()).collect();
    let degraded = reports.iter().any(|report| report.state.is_stalled());

    json!({
        "status": if degraded { "degraded" } else { "healthy" },
        "component": "feed-connector",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "connectors": reports,
    })
}

async fn health_check(State(state): State<HealthState>) -> Json<Value> {
    Json(health_report(&state.statuses))
}

async fn metrics(State(state): State<HealthState>) -> std::result::Result<String, (StatusCode, String)> {
    render_metrics(&state.statuses).map_err(|e| {
        warn!(error = %e, "Failed to render metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Prometheus text exposition of connector state, built fresh per scrape
pub fn render_metrics(statuses: &[Arc<ConnectorStatus>]) -> Result<String> {
    let registry = Registry::new();
    let labels = &["exchange", "symbol"];

    let state = IntGaugeVec::new(
        Opts::new("connector_state", "1 for the connector's current state"),
        &["exchange", "symbol", "state"],
    )?;
    let retries = IntGaugeVec::new(
        Opts::new("connector_retry_count", "Reconnections used from the lifetime budget"),
        labels,
    )?;
    let repairs = IntGaugeVec::new(
        Opts::new("connector_repair_count", "Book reloads after a frame failed to apply"),
        labels,
    )?;
    let frames = IntCounterVec::new(
        Opts::new("connector_frames_received_total", "Frames forwarded to the ingress queue"),
        labels,
    )?;
    let queue_depth = IntGaugeVec::new(
        Opts::new("connector_queue_depth", "Frames waiting to be applied"),
        labels,
    )?;
    let warming_up = IntGaugeVec::new(
        Opts::new("book_warming_up", "1 while the book has no consistent snapshot"),
        labels,
    )?;
    let mid_price = GaugeVec::new(Opts::new("book_mid_price", "Book mid price"), labels)?;
    let spread_bps = GaugeVec::new(Opts::new("book_spread_bps", "Book spread in basis points"), labels)?;

    registry.register(Box::new(state.clone()))?;
    registry.register(Box::new(retries.clone()))?;
    registry.register(Box::new(repairs.clone()))?;
    registry.register(Box::new(frames.clone()))?;
    registry.register(Box::new(queue_depth.clone()))?;
    registry.register(Box::new(warming_up.clone()))?;
    registry.register(Box::new(mid_price.clone()))?;
    registry.register(Box::new(spread_bps.clone()))?;

    for status in statuses {
        let exchange = status.exchange().as_str();
        let values = [exchange, status.symbol()];

        state
            .with_label_values(&[exchange, status.symbol(), status.state().as_str()])
            .set(1);
        retries.with_label_values(&values).set(i64::from(status.retry_count()));
        repairs.with_label_values(&values).set(i64::from(status.repair_count()));
        frames.with_label_values(&values).inc_by(status.frames_received());
        queue_depth
            .with_label_values(&values)
            .set(status.queue_depth() as i64);
        warming_up
            .with_label_values(&values)
            .set(i64::from(status.book().is_warming_up()));

        if let Some(metrics) = status.book().metrics() {
            if let Some(mid) = metrics.mid_price.and_then(|mid| mid.to_f64()) {
                mid_price.with_label_values(&values).set(mid);
            }
            if let Some(spread) = metrics.spread_bps.and_then(|spread| spread.to_f64()) {
                spread_bps.with_label_values(&values).set(spread);
            }
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| MarketDataError::MetricsError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorState, QueueDepth};
    use crate::exchange::Exchange;
    use crate::orderbook::{BookStatus, OrderBookMetrics};
    use rust_decimal_macros::dec;

    fn status(exchange: Exchange, symbol: &str) -> Arc<ConnectorStatus> {
        Arc::new(ConnectorStatus::new(
            exchange,
            symbol,
            BookStatus::new(),
            QueueDepth::default(),
        ))
    }

    #[test]
    fn test_health_report_degrades_on_stalled_connector() {
        let coinbase = status(Exchange::Coinbase, "BTC-USD");
        let bitfinex = status(Exchange::Bitfinex, "tBTCUSD");
        coinbase.mark_subscribed();

        let report = health_report(&[coinbase.clone(), bitfinex.clone()]);
        assert_eq!(report["status"], "healthy");
        assert_eq!(report["connectors"].as_array().unwrap().len(), 2);

        bitfinex.set_state(ConnectorState::Exhausted);
        let report = health_report(&[coinbase, bitfinex]);
        assert_eq!(report["status"], "degraded");
        assert_eq!(report["connectors"][1]["state"], "exhausted");
    }

    #[test]
    fn test_render_metrics() {
        let coinbase = status(Exchange::Coinbase, "BTC-USD");
        coinbase.mark_subscribed();
        coinbase.record_frame();
        coinbase.record_repair();
        coinbase.book().set_warming_up(false);
        coinbase.book().publish_metrics(OrderBookMetrics {
            mid_price: Some(dec!(100.5)),
            spread_bps: Some(dec!(99.5)),
            ..Default::default()
        });

        let text = render_metrics(&[coinbase]).unwrap();
        assert!(text.contains(
            r#"connector_state{exchange="coinbase",state="subscribed",symbol="BTC-USD"} 1"#
        ));
        assert!(text.contains(r#"connector_repair_count{exchange="coinbase",symbol="BTC-USD"} 1"#));
        assert!(text.contains(r#"connector_frames_received_total{exchange="coinbase",symbol="BTC-USD"} 1"#));
        assert!(text.contains(r#"book_warming_up{exchange="coinbase",symbol="BTC-USD"} 0"#));
        assert!(text.contains(r#"book_mid_price{exchange="coinbase",symbol="BTC-USD"} 100.5"#));
    }

    #[tokio::test]
    async fn test_endpoints_over_http() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();

        let server = tokio::spawn(async move {
            axum::serve(listener, router(vec![status(Exchange::Bitpanda, "BTC_EUR")]))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        let health: Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["connectors"][0]["symbol"], "BTC_EUR");
        assert_eq!(health["connectors"][0]["state"], "disconnected");

        let metrics = reqwest::get(format!("http://{}/metrics", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("connector_retry_count"));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
