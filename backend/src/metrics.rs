//! Counters for the mint pipeline, served as JSON on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared through `Arc`; every counter is a relaxed atomic.
#[derive(Default)]
pub struct Metrics {
    /// Mint requests accepted and registered.
    pub requests_received: AtomicU64,
    /// Mint requests refused before registration (underpayment, oracle fee).
    pub requests_rejected: AtomicU64,
    /// Oracle deliveries handed to the fulfiller.
    pub deliveries_sent: AtomicU64,
    /// Fulfillments that minted a token.
    pub mints_completed: AtomicU64,
    /// Deliveries rejected because no matching request was pending.
    pub fulfillments_rejected: AtomicU64,
    /// Deliveries that consumed a pending request but failed to mint.
    pub fulfillments_failed: AtomicU64,
    /// Milliseconds spent in successful fulfillments.
    pub fulfillment_latency_sum_ms: AtomicU64,
    /// Number of fulfillments contributing to latency sum.
    pub fulfillment_count: AtomicU64,
}

impl Metrics {
    /// Create a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mint request that was registered.
    pub fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a mint request refused before registration.
    pub fn record_request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an oracle delivery handed to the fulfiller.
    pub fn record_delivery(&self) {
        self.deliveries_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed mint with its fulfillment latency.
    pub fn record_mint(&self, latency_ms: u64) {
        self.mints_completed.fetch_add(1, Ordering::Relaxed);
        self.fulfillment_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.fulfillment_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery with no matching pending request.
    pub fn record_rejected_fulfillment(&self) {
        self.fulfillments_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fulfillment that consumed its request but did not mint.
    pub fn record_failure(&self) {
        self.fulfillments_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean successful fulfillment latency, 0 before the first mint.
    pub fn avg_latency_ms(&self) -> u64 {
        let count = self.fulfillment_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.fulfillment_latency_sum_ms.load(Ordering::Relaxed) / count
    }

    /// Snapshot every counter as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests_received": self.requests_received.load(Ordering::Relaxed),
            "requests_rejected": self.requests_rejected.load(Ordering::Relaxed),
            "deliveries_sent": self.deliveries_sent.load(Ordering::Relaxed),
            "mints_completed": self.mints_completed.load(Ordering::Relaxed),
            "fulfillments_rejected": self.fulfillments_rejected.load(Ordering::Relaxed),
            "fulfillments_failed": self.fulfillments_failed.load(Ordering::Relaxed),
            "avg_fulfillment_latency_ms": self.avg_latency_ms(),
            "total_fulfillment_latency_ms": self.fulfillment_latency_sum_ms.load(Ordering::Relaxed),
            "fulfillment_count": self.fulfillment_count.load(Ordering::Relaxed),
        })
    }
}
