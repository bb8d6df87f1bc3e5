//! Fulfillment engine: consumes oracle deliveries and completes mints.
//!
//! Each delivery is handed to the workflow on its own task, bounded by a
//! semaphore, so fulfillments for distinct requests run concurrently and a
//! slow one never blocks the rest.

use random_mint::{Delivery, ErrorClass, FulfillmentConsumer, MintError, MintedToken, RequestId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tracing::{error, info, warn};

use crate::metrics::Metrics;

/// Main fulfiller loop. Returns once the delivery channel closes and every
/// spawned fulfillment has finished.
pub async fn run_fulfiller<C>(
    consumer: Arc<C>,
    mut rx: mpsc::Receiver<Delivery>,
    in_flight: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
    concurrency: usize,
) where
    C: FulfillmentConsumer<Output = MintedToken> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));

    while let Some(delivery) = rx.recv().await {
        in_flight.fetch_add(1, Ordering::Relaxed);

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                error!("Semaphore closed, stopping fulfiller");
                break;
            }
        };
        let consumer = consumer.clone();
        let pending = in_flight.clone();
        let met = metrics.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let start = Instant::now();

            match consumer.on_delivery(delivery) {
                Ok(token) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    met.record_mint(latency_ms);
                    info!(
                        request_id = %delivery.request_id,
                        token_id = %token.token_id,
                        category = %token.category,
                        owner = %token.owner,
                        latency_ms,
                        "Fulfilled successfully"
                    );
                }
                Err(e) => handle_fulfillment_error(delivery.request_id, e, &met),
            }

            pending.fetch_sub(1, Ordering::Relaxed);
        });
    }

    // Wait for outstanding tasks by reclaiming every permit.
    let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
    if semaphore.acquire_many(permits).await.is_err() {
        error!("Semaphore closed while draining fulfillments");
    }

    info!("Fulfiller channel closed, shutting down");
}

fn handle_fulfillment_error(request_id: RequestId, error: MintError, metrics: &Metrics) {
    match error.class() {
        ErrorClass::Integrity => {
            metrics.record_rejected_fulfillment();
            warn!(
                %request_id,
                reason = %error,
                "Skipping delivery (non-retryable)"
            );
        }
        _ => {
            metrics.record_failure();
            error!(
                %request_id,
                error = %error,
                "Failed to fulfill"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use random_mint::{
        Category, InMemoryLedger, InMemoryPendingStore, MintSettings, MintWorkflow, MockOracle,
        RandomWord, RarityTable, RecordingSink, Requester, TokenLedger,
    };

    type TestWorkflow = MintWorkflow<MockOracle, InMemoryPendingStore, InMemoryLedger, RecordingSink>;

    fn workflow(uri_count: usize) -> Arc<TestWorkflow> {
        let uris = ["ipfs://a", "ipfs://b", "ipfs://c"]
            .iter()
            .take(uri_count)
            .map(|s| s.to_string())
            .collect();
        Arc::new(
            MintWorkflow::new(
                Arc::new(MockOracle::new()),
                InMemoryPendingStore::new(),
                InMemoryLedger::new("Random IPFS NFT", "RIN", uris),
                RecordingSink::new(),
                RarityTable::default(),
                MintSettings {
                    mint_fee: 1,
                    owner: Requester::new("deployer"),
                },
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn mints_each_delivery_once() {
        let wf = workflow(3);
        let metrics = Arc::new(Metrics::new());
        let in_flight = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel(32);

        let mut ids = Vec::new();
        for i in 0..10u64 {
            let id = wf.request_mint(Requester::new(format!("user-{i}")), 1).unwrap();
            let delivery = wf.oracle().fulfill_with(id, RandomWord::from(i)).unwrap();
            tx.send(delivery).await.unwrap();
            ids.push((id, delivery));
        }
        // Replay every delivery once more.
        for (_, delivery) in &ids {
            tx.send(*delivery).await.unwrap();
        }
        drop(tx);

        run_fulfiller(wf.clone(), rx, in_flight.clone(), metrics.clone(), 4).await;

        assert_eq!(wf.ledger().token_counter(), 10);
        assert_eq!(wf.pending_count(), 0);
        assert_eq!(wf.events().completed().len(), 10);
        assert_eq!(in_flight.load(Ordering::Relaxed), 0);

        let json = metrics.to_json();
        assert_eq!(json["mints_completed"], 10);
        assert_eq!(json["fulfillments_rejected"], 10);
        assert_eq!(json["fulfillments_failed"], 0);
    }

    #[tokio::test]
    async fn mint_failures_are_counted_separately() {
        let wf = workflow(1);
        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(4);

        let id = wf.request_mint(Requester::new("buyer"), 1).unwrap();
        tx.send(wf.oracle().fulfill_with(id, RandomWord::from(99u64)).unwrap())
            .await
            .unwrap();
        drop(tx);

        run_fulfiller(wf.clone(), rx, Arc::new(AtomicU64::new(0)), metrics.clone(), 1).await;

        assert_eq!(metrics.to_json()["fulfillments_failed"], 1);
        assert_eq!(wf.unreconciled().len(), 1);
        assert_eq!(
            wf.unreconciled()[0].error,
            MintError::MissingTokenUri(Category(2))
        );
        assert!(!wf.is_pending(id));
    }
}
