//! Synchronous, caller-controlled oracle for tests and local runs.
//!
//! Mirrors a coordinator mock: request ids start at 1, a funded subscription
//! pays a flat fee per request, and the caller decides when (and with which
//! word) each request is fulfilled. Fulfilling an id the mock never issued, or
//! one it already fulfilled, fails with `UnknownRequest`.

use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{MintError, MintResult};
use crate::oracle::{Delivery, FulfillmentConsumer, RandomWord, RandomnessOracle, expand_random_word};
use crate::state::RequestId;

#[derive(Default)]
struct MockState {
    next_id: u64,
    issued: HashSet<RequestId>,
    scripted_ids: VecDeque<RequestId>,
    subscription_balance: u128,
}

pub struct MockOracle {
    fee: u128,
    state: Mutex<MockState>,
}

impl MockOracle {
    /// A mock that charges nothing per request.
    pub fn new() -> Self {
        Self::with_fee(0)
    }

    /// A mock that charges `fee` from its subscription on every request.
    pub fn with_fee(fee: u128) -> Self {
        Self {
            fee,
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
        }
    }

    pub fn fee(&self) -> u128 {
        self.fee
    }

    pub fn fund_subscription(&self, amount: u128) {
        let mut state = self.lock();
        state.subscription_balance = state.subscription_balance.saturating_add(amount);
    }

    pub fn subscription_balance(&self) -> u128 {
        self.lock().subscription_balance
    }

    /// Force the next `request` to return `request_id` instead of a fresh id.
    ///
    /// Lets tests provoke `DuplicateRequest` from a misbehaving oracle.
    pub fn script_next_id(&self, request_id: RequestId) {
        self.lock().scripted_ids.push_back(request_id);
    }

    pub fn is_outstanding(&self, request_id: RequestId) -> bool {
        self.lock().issued.contains(&request_id)
    }

    /// The word the mock delivers for `request_id` when none is supplied.
    pub fn word_for(request_id: RequestId) -> RandomWord {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&Sha256::digest(request_id.0.to_le_bytes()));
        expand_random_word(&RandomWord::from_bytes(seed), 1)[0]
    }

    /// Fulfill with an explicit word.
    pub fn fulfill_with(&self, request_id: RequestId, random_word: RandomWord) -> MintResult<Delivery> {
        if !self.lock().issued.remove(&request_id) {
            return Err(MintError::UnknownRequest(request_id));
        }
        Ok(Delivery {
            request_id,
            random_word,
        })
    }

    /// Fulfill `request_id` with its deterministic word and deliver it to
    /// `consumer` in the same call.
    pub fn fulfill_random_words<C: FulfillmentConsumer>(
        &self,
        request_id: RequestId,
        consumer: &C,
    ) -> MintResult<C::Output> {
        let delivery = self.fulfill(request_id)?;
        consumer.on_delivery(delivery)
    }

    /// Like [`fulfill_random_words`](Self::fulfill_random_words) with a
    /// caller-chosen word.
    pub fn fulfill_random_words_with<C: FulfillmentConsumer>(
        &self,
        request_id: RequestId,
        random_word: RandomWord,
        consumer: &C,
    ) -> MintResult<C::Output> {
        let delivery = self.fulfill_with(request_id, random_word)?;
        consumer.on_delivery(delivery)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomnessOracle for MockOracle {
    fn request(&self) -> MintResult<RequestId> {
        let mut state = self.lock();
        if state.subscription_balance < self.fee {
            return Err(MintError::FeeRejected {
                required: self.fee,
                balance: state.subscription_balance,
            });
        }
        state.subscription_balance -= self.fee;

        let request_id = match state.scripted_ids.pop_front() {
            Some(id) => id,
            None => {
                let id = RequestId(state.next_id);
                state.next_id += 1;
                id
            }
        };
        state.issued.insert(request_id);
        Ok(request_id)
    }

    fn fulfill(&self, request_id: RequestId) -> MintResult<Delivery> {
        self.fulfill_with(request_id, Self::word_for(request_id))
    }

    fn outstanding(&self) -> usize {
        self.lock().issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl FulfillmentConsumer for Echo {
        type Output = Delivery;

        fn on_delivery(&self, delivery: Delivery) -> MintResult<Delivery> {
            Ok(delivery)
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let oracle = MockOracle::new();
        assert_eq!(oracle.request().unwrap(), RequestId(1));
        assert_eq!(oracle.request().unwrap(), RequestId(2));
        assert_eq!(oracle.outstanding(), 2);
    }

    #[test]
    fn fulfilling_unissued_id_fails() {
        let oracle = MockOracle::new();
        assert_eq!(
            oracle.fulfill(RequestId(0)),
            Err(MintError::UnknownRequest(RequestId(0)))
        );
        assert_eq!(
            oracle.fulfill(RequestId(1)),
            Err(MintError::UnknownRequest(RequestId(1)))
        );
    }

    #[test]
    fn each_request_is_delivered_once() {
        let oracle = MockOracle::new();
        let id = oracle.request().unwrap();
        let delivery = oracle.fulfill_random_words(id, &Echo).unwrap();
        assert_eq!(delivery.request_id, id);
        assert_eq!(delivery.random_word, MockOracle::word_for(id));
        assert!(!oracle.is_outstanding(id));
        assert_eq!(
            oracle.fulfill_random_words(id, &Echo),
            Err(MintError::UnknownRequest(id))
        );
    }

    #[test]
    fn explicit_word_is_passed_through() {
        let oracle = MockOracle::new();
        let id = oracle.request().unwrap();
        let delivery = oracle
            .fulfill_random_words_with(id, RandomWord::from(9u64), &Echo)
            .unwrap();
        assert_eq!(delivery.random_word, RandomWord::from(9u64));
    }

    #[test]
    fn unfunded_subscription_rejects_request() {
        let oracle = MockOracle::with_fee(250);
        assert_eq!(
            oracle.request(),
            Err(MintError::FeeRejected {
                required: 250,
                balance: 0
            })
        );
        assert_eq!(oracle.outstanding(), 0);

        oracle.fund_subscription(300);
        assert!(oracle.request().is_ok());
        assert_eq!(oracle.subscription_balance(), 50);
        assert!(oracle.request().is_err());
    }

    #[test]
    fn scripted_id_is_returned_next() {
        let oracle = MockOracle::new();
        oracle.script_next_id(RequestId(1));
        assert_eq!(oracle.request().unwrap(), RequestId(1));
        assert_eq!(oracle.request().unwrap(), RequestId(1));
        assert_eq!(oracle.request().unwrap(), RequestId(2));
    }

    #[test]
    fn default_words_differ_per_request() {
        assert_ne!(MockOracle::word_for(RequestId(1)), MockOracle::word_for(RequestId(2)));
        assert_eq!(MockOracle::word_for(RequestId(1)), MockOracle::word_for(RequestId(1)));
    }
}
