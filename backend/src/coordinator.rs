//! In-process randomness coordinator.
//!
//! Issues monotonically increasing request ids, charges a flat fee per
//! request from a funded subscription, and produces HMAC-derived random words
//! on fulfillment. Each issued id is fulfilled at most once: the oracle-side
//! record is removed when its word is produced.

use dashmap::DashMap;
use random_mint::{Delivery, MintError, MintResult, RandomnessOracle, RequestId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::vrf::compute_randomness;

/// Oracle-side record of an issued request.
#[derive(Debug, Clone, Copy)]
struct OracleRequest {
    /// Position of the request in issue order, starting at 0.
    sequence: u64,
}

pub struct HmacCoordinator {
    hmac_secret: Vec<u8>,
    key_hash: [u8; 32],
    fee: u128,
    request_counter: AtomicU64,
    sequence: AtomicU64,
    subscription_balance: Mutex<u128>,
    requests: DashMap<RequestId, OracleRequest>,
}

impl HmacCoordinator {
    pub fn new(hmac_secret: Vec<u8>, key_hash: [u8; 32], fee: u128) -> Self {
        Self {
            hmac_secret,
            key_hash,
            fee,
            request_counter: AtomicU64::new(1),
            sequence: AtomicU64::new(0),
            subscription_balance: Mutex::new(0),
            requests: DashMap::new(),
        }
    }

    pub fn fund_subscription(&self, amount: u128) {
        let mut balance = self.balance();
        *balance = balance.saturating_add(amount);
    }

    pub fn subscription_balance(&self) -> u128 {
        *self.balance()
    }

    pub fn fee(&self) -> u128 {
        self.fee
    }

    fn balance(&self) -> MutexGuard<'_, u128> {
        self.subscription_balance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl RandomnessOracle for HmacCoordinator {
    fn request(&self) -> MintResult<RequestId> {
        {
            let mut balance = self.balance();
            if *balance < self.fee {
                return Err(MintError::FeeRejected {
                    required: self.fee,
                    balance: *balance,
                });
            }
            *balance -= self.fee;
        }

        let request_id = RequestId(self.request_counter.fetch_add(1, Ordering::SeqCst));
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.requests.insert(request_id, OracleRequest { sequence });
        debug!(%request_id, sequence, "Issued randomness request");
        Ok(request_id)
    }

    fn fulfill(&self, request_id: RequestId) -> MintResult<Delivery> {
        let (_, request) = self
            .requests
            .remove(&request_id)
            .ok_or(MintError::UnknownRequest(request_id))?;

        let random_word = compute_randomness(
            &self.hmac_secret,
            &self.key_hash,
            request.sequence,
            request_id,
        );
        Ok(Delivery {
            request_id,
            random_word,
        })
    }

    fn outstanding(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(fee: u128) -> HmacCoordinator {
        HmacCoordinator::new(b"test-secret".to_vec(), [7u8; 32], fee)
    }

    #[test]
    fn issues_unique_ids_from_one() {
        let c = coordinator(0);
        assert_eq!(c.request().unwrap(), RequestId(1));
        assert_eq!(c.request().unwrap(), RequestId(2));
        assert_eq!(c.outstanding(), 2);
    }

    #[test]
    fn fulfills_each_id_once() {
        let c = coordinator(0);
        let id = c.request().unwrap();
        let delivery = c.fulfill(id).unwrap();
        assert_eq!(delivery.request_id, id);
        assert_eq!(c.fulfill(id), Err(MintError::UnknownRequest(id)));
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn delivered_word_matches_recorded_sequence() {
        let c = coordinator(0);
        let first = c.request().unwrap();
        let second = c.request().unwrap();
        let recorded = c.requests.get(&second).map(|r| r.sequence).unwrap();
        assert_eq!(recorded, 1);

        let delivery = c.fulfill(second).unwrap();
        assert_eq!(
            delivery.random_word,
            compute_randomness(b"test-secret", &[7u8; 32], recorded, second)
        );
        assert_eq!(
            c.fulfill(first).unwrap().random_word,
            compute_randomness(b"test-secret", &[7u8; 32], 0, first)
        );
    }

    #[test]
    fn same_inputs_reproduce_words_across_coordinators() {
        let a = coordinator(0);
        let b = coordinator(0);
        let id_a = a.request().unwrap();
        let id_b = b.request().unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(a.fulfill(id_a).unwrap(), b.fulfill(id_b).unwrap());
    }

    #[test]
    fn rejects_unissued_id() {
        let c = coordinator(0);
        assert_eq!(
            c.fulfill(RequestId(42)),
            Err(MintError::UnknownRequest(RequestId(42)))
        );
    }

    #[test]
    fn charges_subscription_per_request() {
        let c = coordinator(100);
        assert_eq!(
            c.request(),
            Err(MintError::FeeRejected {
                required: 100,
                balance: 0
            })
        );
        c.fund_subscription(250);
        c.request().unwrap();
        c.request().unwrap();
        assert_eq!(c.subscription_balance(), 50);
        assert!(matches!(c.request(), Err(MintError::FeeRejected { .. })));
        assert_eq!(c.outstanding(), 2);
    }

    #[test]
    fn concurrent_requests_get_distinct_ids() {
        let c = coordinator(0);
        let ids: Vec<RequestId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..32).map(|_| s.spawn(|| c.request().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 32);
    }
}
