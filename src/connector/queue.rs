//! Ingress queue
//!
//! Unbounded FIFO between a session's receive loop (single producer) and the
//! connector's processing loop (single consumer). Frames are never dropped
//! or reordered. Dropping the sender is the processing loop's shutdown
//! signal: it drains what is left and stops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{MarketDataError, Result};

/// Number of frames waiting in a queue
#[derive(Debug, Clone, Default)]
pub struct QueueDepth(Arc<AtomicUsize>);

impl QueueDepth {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Create a connected sender/receiver pair
pub fn ingress_queue() -> (IngressSender, IngressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = QueueDepth::default();

    (
        IngressSender {
            tx,
            depth: depth.clone(),
        },
        IngressReceiver { rx, depth },
    )
}

#[derive(Debug)]
pub struct IngressSender {
    tx: mpsc::UnboundedSender<Value>,
    depth: QueueDepth,
}

impl IngressSender {
    /// Enqueue a decoded frame. Fails only once the receiver is gone.
    pub fn push(&self, frame: Value) -> Result<()> {
        self.depth.0.fetch_add(1, Ordering::Relaxed);
        self.tx.send(frame).map_err(|_| {
            self.depth.0.fetch_sub(1, Ordering::Relaxed);
            MarketDataError::QueueClosed
        })
    }

    pub fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct IngressReceiver {
    rx: mpsc::UnboundedReceiver<Value>,
    depth: QueueDepth,
}

impl IngressReceiver {
    /// Next frame in arrival order; waits while the queue is empty and
    /// returns `None` once the sender is dropped and the queue drained.
    pub async fn pop(&mut self) -> Option<Value> {
        let frame = self.rx.recv().await;
        if frame.is_some() {
            self.depth.0.fetch_sub(1, Ordering::Relaxed);
        }
        frame
    }

    pub fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }
}
