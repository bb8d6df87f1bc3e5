//! Oracle-side event listener.
//!
//! The workflow publishes its events through a [`ChannelSink`]. The listener
//! consumes that stream and, for every `MintRequested`, asks the oracle to
//! fulfill the request and forwards the resulting [`Delivery`] to the
//! fulfiller. Deliveries are only produced after the workflow has registered
//! the request, so a delivery can never overtake its own registration.

use random_mint::{Delivery, EventSink, LogSink, MintEvent, RandomnessOracle, RequestId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;

/// Event sink that forwards workflow events onto an unbounded channel. Once
/// the receiver is gone, events are written to the log instead.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MintEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<MintEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MintEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: MintEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            warn!(event = event.name(), "Event channel closed, logging event only");
            LogSink.emit(event);
        }
    }
}

/// Consume workflow events and produce oracle deliveries.
///
/// Each request is fulfilled on its own task after `delay`, so a slow
/// request never holds up the others. Returns when the event channel closes.
pub async fn run_oracle_listener<O>(
    oracle: Arc<O>,
    mut events: mpsc::UnboundedReceiver<MintEvent>,
    deliveries: mpsc::Sender<Delivery>,
    delay: Duration,
    metrics: Arc<Metrics>,
) where
    O: RandomnessOracle + 'static,
{
    info!(delay = ?delay, "Oracle listener started");

    while let Some(event) = events.recv().await {
        let MintEvent::MintRequested { request_id, .. } = event else {
            debug!(event = event.name(), "Ignoring event");
            continue;
        };

        let oracle = oracle.clone();
        let tx = deliveries.clone();
        let met = metrics.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            deliver(oracle.as_ref(), request_id, &tx, &met).await;
        });
    }

    info!("Event channel closed, stopping oracle listener");
}

async fn deliver<O: RandomnessOracle>(
    oracle: &O,
    request_id: RequestId,
    tx: &mpsc::Sender<Delivery>,
    metrics: &Metrics,
) {
    let delivery = match oracle.fulfill(request_id) {
        Ok(d) => d,
        Err(e) => {
            warn!(%request_id, error = %e, "Oracle could not fulfill request");
            return;
        }
    };

    debug!(%request_id, "Sending oracle delivery");
    if tx.send(delivery).await.is_err() {
        error!(%request_id, "Delivery channel closed, dropping fulfillment");
        return;
    }
    metrics.record_delivery();
}
