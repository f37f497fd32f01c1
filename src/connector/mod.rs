//! Per-symbol connector
//!
//! A connector is two concurrent units joined by the ingress queue:
//!
//! - [`Connector::run`] drives the transport session: connect, subscribe,
//!   receive frames into the queue, and reconnect with a cool-down until the
//!   lifetime retry budget is spent.
//! - [`BookProcessor::run`] drains the queue into the book, reloading it from
//!   a snapshot whenever a frame cannot be applied.

pub mod policy;
pub mod queue;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::exchange::Exchange;
use crate::orderbook::Book;
use crate::websocket::Session;

pub use policy::ReconnectPolicy;
pub use queue::{ingress_queue, IngressReceiver, IngressSender, QueueDepth};
pub use status::{ConnectorReport, ConnectorState, ConnectorStatus};

/// Minimum gap between two metric publications from the processing loop
const METRICS_PUBLISH_INTERVAL: Duration = Duration::from_millis(250);
/// Pause after a failed reload before the next frame is applied
const RELOAD_BACKOFF: Duration = Duration::from_secs(1);

/// Session side of one symbol's connector
pub struct Connector<S> {
    session: S,
    queue: Option<IngressSender>,
    policy: ReconnectPolicy,
    retry_count: u32,
    last_subscribe: Option<Instant>,
    status: Arc<ConnectorStatus>,
}

/// Processing side of one symbol's connector. Owns the book.
pub struct BookProcessor<B> {
    book: B,
    queue: IngressReceiver,
    status: Arc<ConnectorStatus>,
}

impl<S: Session> Connector<S> {
    /// Wire a session and a book together through a fresh ingress queue
    pub fn new<B: Book>(
        exchange: Exchange,
        symbol: &str,
        session: S,
        book: B,
        policy: ReconnectPolicy,
    ) -> (Self, BookProcessor<B>) {
        let (tx, rx) = ingress_queue();
        let status = Arc::new(ConnectorStatus::new(exchange, symbol, book.status(), tx.depth()));

        let connector = Self {
            session,
            queue: Some(tx),
            policy,
            retry_count: 0,
            last_subscribe: None,
            status: status.clone(),
        };
        let processor = BookProcessor {
            book,
            queue: rx,
            status,
        };

        (connector, processor)
    }

    pub fn status(&self) -> Arc<ConnectorStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> ConnectorState {
        self.status.state()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Run the reconnection state machine until a terminal state is reached.
    ///
    /// Returns immediately once the connector is terminal, so calling this
    /// again after exhaustion never opens another connection.
    pub async fn run(&mut self, cancel: &CancellationToken) -> ConnectorState {
        loop {
            let state = self.status.state();
            if state.is_terminal() {
                return state;
            }

            self.status.set_state(ConnectorState::Connecting);
            info!(
                exchange = %self.status.exchange(),
                symbol = %self.status.symbol(),
                retry_count = self.retry_count,
                "Connecting"
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.connect() => Some(result),
            };

            let error = match outcome {
                None => {
                    self.shutdown().await;
                    return self.finish(ConnectorState::Stopped);
                }
                Some(Ok(())) => {
                    info!(
                        exchange = %self.status.exchange(),
                        symbol = %self.status.symbol(),
                        "Processing loop gone, stopping connector"
                    );
                    self.shutdown().await;
                    return self.finish(ConnectorState::Stopped);
                }
                Some(Err(e)) => e,
            };

            self.status.set_last_error(error.to_string());

            if !error.is_retryable() {
                error!(
                    exchange = %self.status.exchange(),
                    symbol = %self.status.symbol(),
                    error = %error,
                    "Connector failed"
                );
                self.session.close().await;
                return self.finish(ConnectorState::Failed);
            }

            warn!(
                exchange = %self.status.exchange(),
                symbol = %self.status.symbol(),
                error = %error,
                "Disconnected"
            );
            self.status.set_state(ConnectorState::Disconnected);

            if !self.policy.allows_retry(self.retry_count) {
                error!(
                    exchange = %self.status.exchange(),
                    symbol = %self.status.symbol(),
                    retry_count = self.retry_count,
                    max_retries = self.policy.max_retries,
                    "Reconnection attempts exhausted, symbol will receive no more data"
                );
                self.session.close().await;
                return self.finish(ConnectorState::Exhausted);
            }

            self.retry_count += 1;
            self.status.set_retry_count(self.retry_count);

            let delay = self
                .policy
                .cool_down_delay(self.last_subscribe.map(|at| at.elapsed()));

            if !delay.is_zero() {
                info!(
                    exchange = %self.status.exchange(),
                    symbol = %self.status.symbol(),
                    retry_count = self.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Cooling down before reconnect"
                );

                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = sleep(delay) => false,
                };
                if cancelled {
                    self.session.close().await;
                    return self.finish(ConnectorState::Stopped);
                }
            }
        }
    }

    /// One session lifetime: handshake, then forward frames until the socket
    /// fails. `Ok` only when the queue's receiving end is gone.
    async fn connect(&mut self) -> Result<()> {
        // Channel ids from the previous socket died with it
        self.status.book().clear_channels();
        self.session.connect().await?;

        self.last_subscribe = Some(Instant::now());
        self.status.mark_subscribed();
        info!(
            exchange = %self.status.exchange(),
            symbol = %self.status.symbol(),
            "Subscribed"
        );

        let Some(queue) = self.queue.as_ref() else {
            return Ok(());
        };

        loop {
            let frame = self.session.next_frame().await?;
            self.status.record_frame();
            if queue.push(frame).is_err() {
                return Ok(());
            }
        }
    }

    /// Unsubscribe if subscribed, then close the socket
    async fn shutdown(&mut self) {
        if self.status.state() == ConnectorState::Subscribed && self.session.is_connected() {
            let channel_ids = self.status.book().channel_ids();
            match self.session.unsubscribe(&channel_ids).await {
                Ok(acks) => info!(
                    exchange = %self.status.exchange(),
                    symbol = %self.status.symbol(),
                    acks = acks.len(),
                    "Unsubscribed"
                ),
                Err(e) => warn!(
                    exchange = %self.status.exchange(),
                    symbol = %self.status.symbol(),
                    error = %e,
                    "Unsubscribe failed"
                ),
            }
        }
        self.session.close().await;
    }

    /// Enter a terminal state and release the queue so the processing loop
    /// drains and stops.
    fn finish(&mut self, state: ConnectorState) -> ConnectorState {
        self.queue = None;
        self.status.set_state(state);
        info!(
            exchange = %self.status.exchange(),
            symbol = %self.status.symbol(),
            state = %state,
            retry_count = self.retry_count,
            repair_count = self.status.repair_count(),
            "Connector finished"
        );
        state
    }
}

impl<B: Book> BookProcessor<B> {
    pub fn status(&self) -> Arc<ConnectorStatus> {
        self.status.clone()
    }

    /// Apply queued frames in arrival order until the queue is closed and
    /// drained. Hands the book back when done.
    pub async fn run(mut self) -> B {
        let mut last_publish: Option<Instant> = None;

        while let Some(frame) = self.queue.pop().await {
            if !self.book.apply_message(&frame) {
                self.repair(&frame).await;
            }

            if last_publish.map_or(true, |at| at.elapsed() >= METRICS_PUBLISH_INTERVAL) {
                self.status.book().publish_metrics(self.book.metrics());
                last_publish = Some(Instant::now());
            }
        }

        self.status.book().publish_metrics(self.book.metrics());
        info!(
            exchange = %self.status.exchange(),
            symbol = %self.status.symbol(),
            "Ingress queue drained, processing loop finished"
        );
        self.book
    }

    /// Resynchronise the book. The failing frame is not replayed.
    async fn repair(&mut self, frame: &serde_json::Value) {
        let repairs = self.status.record_repair();
        warn!(
            exchange = %self.status.exchange(),
            symbol = %self.status.symbol(),
            repair_count = repairs,
            "Book out of sync, reloading from snapshot"
        );
        debug!(frame = %frame, "Frame that failed to apply");

        if let Err(e) = self.book.reload().await {
            error!(
                exchange = %self.status.exchange(),
                symbol = %self.status.symbol(),
                error = %e,
                "Book reload failed"
            );
            sleep(RELOAD_BACKOFF).await;
        }
    }
}
