//! Connector set
//!
//! Starts one connector per basket entry, runs every session concurrently
//! under one cancellation token, and reports book readiness on a timer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, Subscription};
use crate::connector::{Connector, ConnectorReport, ConnectorState, ConnectorStatus, ReconnectPolicy};
use crate::error::Result;
use crate::exchange::Exchange;
use crate::orderbook::{BitfinexBook, BitpandaBook, Book, CoinbaseBook, OrderBookMetrics, SnapshotClient};
use crate::websocket::{Session, TransportSession};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Both halves of one connector, ready to be driven
struct Launch {
    connect: BoxFuture<'static, ConnectorState>,
    process: BoxFuture<'static, ()>,
}

fn launch<S, B>(
    subscription: &Subscription,
    session: S,
    book: B,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) -> (Launch, Arc<ConnectorStatus>)
where
    S: Session + 'static,
    B: Book,
{
    let (mut connector, processor) = Connector::new(
        subscription.exchange,
        &subscription.symbol,
        session,
        book,
        policy,
    );
    let status = connector.status();

    let launch = Launch {
        connect: async move { connector.run(&cancel).await }.boxed(),
        process: async move {
            processor.run().await;
        }
        .boxed(),
    };

    (launch, status)
}

pub struct Supervisor {
    status_interval: Duration,
    launches: Vec<Launch>,
    statuses: Vec<Arc<ConnectorStatus>>,
}

impl Supervisor {
    /// Build one connector per basket entry. Nothing runs until [`Supervisor::run`].
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Result<Self> {
        let client = SnapshotClient::new(SNAPSHOT_TIMEOUT)?;
        let policy = ReconnectPolicy::from_config(&config);

        let mut launches = Vec::with_capacity(config.basket.len());
        let mut statuses = Vec::with_capacity(config.basket.len());

        for subscription in &config.basket {
            let endpoints = config.endpoints(subscription.exchange);
            let symbol = subscription.symbol.as_str();
            let session = TransportSession::new(subscription.exchange, &endpoints.ws, symbol)
                .with_timeouts(config.stale_timeout(), config.ack_timeout());
            let cancel = cancel.clone();

            let (entry, status) = match subscription.exchange {
                Exchange::Coinbase => {
                    let book = CoinbaseBook::new(symbol, &endpoints.rest, client.clone());
                    launch(subscription, session, book, policy, cancel)
                }
                Exchange::Bitfinex => {
                    let book =
                        BitfinexBook::new(symbol, &endpoints.rest, config.book_depth, client.clone());
                    launch(subscription, session, book, policy, cancel)
                }
                Exchange::Bitpanda => {
                    let book = BitpandaBook::new(symbol, &endpoints.rest, client.clone());
                    launch(subscription, session, book, policy, cancel)
                }
            };

            info!(
                exchange = %subscription.exchange,
                symbol = %subscription.symbol,
                endpoint = %endpoints.ws,
                "Connector configured"
            );
            launches.push(entry);
            statuses.push(status);
        }

        Ok(Self {
            status_interval: config.status_interval(),
            launches,
            statuses,
        })
    }

    /// Status handles, in basket order
    pub fn statuses(&self) -> Vec<Arc<ConnectorStatus>> {
        self.statuses.clone()
    }

    /// Drive every connector to a terminal state, then wait for every
    /// processing loop to drain.
    pub async fn run(self) -> Vec<ConnectorReport> {
        let mut connects = Vec::with_capacity(self.launches.len());
        let mut processors = Vec::with_capacity(self.launches.len());

        for entry in self.launches {
            processors.push(tokio::spawn(entry.process));
            connects.push(entry.connect);
        }

        let timer_statuses = self.statuses.clone();
        let period = self.status_interval;
        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                log_status(&timer_statuses);
            }
        });

        info!(connectors = connects.len(), "Connectors started");
        let states = join_all(connects).await;

        for (status, state) in self.statuses.iter().zip(&states) {
            if state.is_stalled() {
                warn!(
                    exchange = %status.exchange(),
                    symbol = %status.symbol(),
                    state = %state,
                    "Connector stalled"
                );
            }
        }

        for processor in processors {
            if let Err(e) = processor.await {
                error!(error = %e, "Processing task ended abnormally");
            }
        }
        timer.abort();

        info!("All processing loops drained");
        self.statuses.iter().map(|status| status.report()).collect()
    }
}

/// What the status timer has to say about one connector
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Exhausted or failed; the book no longer updates
    Stalled,
    /// No consistent snapshot yet
    WarmingUp,
    /// Book consistent, with the last published metrics
    Ready(OrderBookMetrics),
    /// Consistent but nothing published yet
    Pending,
}

/// Classify one connector from its shared status. Reads only.
pub fn readiness(status: &ConnectorStatus) -> Readiness {
    let book = status.book();
    if status.state().is_stalled() {
        Readiness::Stalled
    } else if book.is_warming_up() {
        Readiness::WarmingUp
    } else {
        book.metrics().map_or(Readiness::Pending, Readiness::Ready)
    }
}

/// One readiness line per connector
pub fn log_status(statuses: &[Arc<ConnectorStatus>]) {
    for status in statuses {
        match readiness(status) {
            Readiness::Stalled => warn!(
                exchange = %status.exchange(),
                symbol = %status.symbol(),
                state = %status.state(),
                last_error = ?status.last_error(),
                "Connector stalled, book no longer updating"
            ),
            Readiness::WarmingUp => info!(
                exchange = %status.exchange(),
                symbol = %status.symbol(),
                state = %status.state(),
                queue_depth = status.queue_depth(),
                "Book warming up"
            ),
            Readiness::Ready(metrics) => info!(
                exchange = %status.exchange(),
                symbol = %status.symbol(),
                mid_price = ?metrics.mid_price,
                spread_bps = ?metrics.spread_bps,
                imbalance = ?metrics.imbalance,
                last_trade = ?metrics.last_trade_price,
                queue_depth = status.queue_depth(),
                "Order book status"
            ),
            Readiness::Pending => {}
        }
    }
}
