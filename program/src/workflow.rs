//! Mint request / fulfillment state machine.
//!
//! ## Request lifecycle
//!
//! 1. **Request**: [`MintWorkflow::request_mint`] checks the payment, asks the
//!    oracle for a request id, registers the requester in the pending store
//!    and emits `MintRequested`. The request is now `REQUESTED`.
//! 2. **Fulfill**: the oracle later delivers `(request_id, random_word)` to
//!    [`MintWorkflow::on_fulfillment`], which takes the pending entry, maps the
//!    word to a rarity category, mints the token and emits `MintCompleted`.
//!    The request is now `FULFILLED` and its id can never be fulfilled again.
//!
//! Once `take` has removed an entry it is never re-inserted. If resolution or
//! minting fails after that point the fulfillment is recorded as unreconciled
//! for an operator to settle.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, instrument, warn};

use crate::errors::{MintError, MintResult};
use crate::events::{EventSink, MintEvent};
use crate::ledger::TokenLedger;
use crate::oracle::{Delivery, FulfillmentConsumer, RandomWord, RandomnessOracle};
use crate::rarity::RarityTable;
use crate::state::{MintedToken, PendingRequest, Requester, RequestId};
use crate::store::PendingRequestStore;

/// Static parameters of a mint workflow.
#[derive(Debug, Clone)]
pub struct MintSettings {
    /// Minimum payment accepted by `request_mint`.
    pub mint_fee: u128,
    /// Collection owner; the only identity allowed to withdraw the treasury.
    pub owner: Requester,
}

/// A fulfillment whose pending entry was consumed but which did not mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreconciledFulfillment {
    pub request: PendingRequest,
    pub random_word: RandomWord,
    pub error: MintError,
}

pub struct MintWorkflow<O, S, L, E> {
    oracle: Arc<O>,
    store: S,
    ledger: L,
    events: E,
    rarity: RarityTable,
    settings: MintSettings,
    sequence: AtomicU64,
    treasury: Mutex<u128>,
    unreconciled: DashMap<RequestId, UnreconciledFulfillment>,
}

impl<O, S, L, E> MintWorkflow<O, S, L, E>
where
    O: RandomnessOracle,
    S: PendingRequestStore,
    L: TokenLedger,
    E: EventSink,
{
    /// Build a workflow. The rarity table is validated here so that a table
    /// that does not cover `[0, table_size)` is rejected before any request.
    pub fn new(
        oracle: Arc<O>,
        store: S,
        ledger: L,
        events: E,
        rarity: RarityTable,
        settings: MintSettings,
    ) -> MintResult<Self> {
        rarity.validate()?;
        Ok(Self {
            oracle,
            store,
            ledger,
            events,
            rarity,
            settings,
            sequence: AtomicU64::new(0),
            treasury: Mutex::new(0),
            unreconciled: DashMap::new(),
        })
    }

    /// Start a mint for `requester`.
    ///
    /// Nothing is mutated when the payment is short or the oracle refuses the
    /// request.
    pub fn request_mint(&self, requester: Requester, payment: u128) -> MintResult<RequestId> {
        if payment < self.settings.mint_fee {
            warn!(%requester, payment, mint_fee = self.settings.mint_fee, "Rejected mint request: insufficient payment");
            return Err(MintError::InsufficientPayment {
                required: self.settings.mint_fee,
                provided: payment,
            });
        }

        let request_id = self.oracle.request().inspect_err(|err| {
            warn!(%requester, error = %err, "Oracle refused randomness request");
        })?;

        let pending = PendingRequest {
            request_id,
            requester: requester.clone(),
            requested_at_sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        };
        if let Err(err) = self.store.put(pending) {
            error!(%request_id, %requester, error = %err, "Oracle issued a request id that is still pending");
            return Err(err);
        }

        *self.lock_treasury() += payment;

        info!(%request_id, %requester, "Mint requested");
        self.events.emit(MintEvent::MintRequested {
            request_id,
            requester,
        });
        Ok(request_id)
    }

    /// Oracle callback. Never called directly by an end user.
    #[instrument(skip_all, fields(request_id = %request_id))]
    pub fn on_fulfillment(&self, request_id: RequestId, random_word: RandomWord) -> MintResult<MintedToken> {
        let request = self.store.take(request_id).inspect_err(|err| {
            warn!(error = %err, "Rejected fulfillment");
        })?;

        match self.complete(&request, &random_word) {
            Ok(token) => {
                info!(
                    token_id = %token.token_id,
                    category = %token.category,
                    owner = %token.owner,
                    "Mint completed"
                );
                self.events.emit(MintEvent::MintCompleted {
                    token_id: token.token_id,
                    category: token.category,
                    owner: token.owner.clone(),
                });
                Ok(token)
            }
            Err(err) => {
                error!(
                    requester = %request.requester,
                    error = %err,
                    "Fulfillment consumed but mint failed; recorded for reconciliation"
                );
                self.unreconciled.insert(
                    request_id,
                    UnreconciledFulfillment {
                        request,
                        random_word,
                        error: err.clone(),
                    },
                );
                Err(err)
            }
        }
    }

    fn complete(&self, request: &PendingRequest, random_word: &RandomWord) -> MintResult<MintedToken> {
        let category = self.rarity.resolve(random_word)?;
        let token_id = self.ledger.mint_to(&request.requester, category)?;
        Ok(MintedToken {
            token_id,
            category,
            owner: request.requester.clone(),
        })
    }

    /// Operator action: drop a pending request. A later delivery for it is
    /// rejected with `UnknownRequest`. Only the collection owner may call.
    pub fn purge_request(&self, caller: &Requester, request_id: RequestId) -> MintResult<PendingRequest> {
        self.ensure_owner(caller)?;
        let request = self.store.take(request_id)?;
        warn!(%request_id, requester = %request.requester, "Purged pending request");
        Ok(request)
    }

    pub fn unreconciled(&self) -> Vec<UnreconciledFulfillment> {
        self.unreconciled.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Operator action: mark an unreconciled fulfillment as settled.
    pub fn resolve_unreconciled(&self, request_id: RequestId) -> Option<UnreconciledFulfillment> {
        self.unreconciled.remove(&request_id).map(|(_, entry)| entry)
    }

    pub fn treasury_balance(&self) -> u128 {
        *self.lock_treasury()
    }

    /// Move the whole treasury balance out. Only the collection owner may call.
    pub fn withdraw(&self, caller: &Requester) -> MintResult<u128> {
        self.ensure_owner(caller)?;
        let amount = std::mem::take(&mut *self.lock_treasury());
        info!(amount, owner = %caller, "Treasury withdrawn");
        Ok(amount)
    }

    pub fn mint_fee(&self) -> u128 {
        self.settings.mint_fee
    }

    pub fn rarity_table(&self) -> &RarityTable {
        &self.rarity
    }

    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.store.get(request_id).is_some()
    }

    pub fn pending_request(&self, request_id: RequestId) -> Option<PendingRequest> {
        self.store.get(request_id)
    }

    pub fn requester_of(&self, request_id: RequestId) -> Option<Requester> {
        self.store.get(request_id).map(|r| r.requester)
    }

    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    fn ensure_owner(&self, caller: &Requester) -> MintResult<()> {
        if caller != &self.settings.owner {
            warn!(%caller, "Rejected owner-only action");
            return Err(MintError::NotOwner);
        }
        Ok(())
    }

    fn lock_treasury(&self) -> MutexGuard<'_, u128> {
        self.treasury.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<O, S, L, E> FulfillmentConsumer for MintWorkflow<O, S, L, E>
where
    O: RandomnessOracle,
    S: PendingRequestStore,
    L: TokenLedger,
    E: EventSink,
{
    type Output = MintedToken;

    fn on_delivery(&self, delivery: Delivery) -> MintResult<MintedToken> {
        self.on_fulfillment(delivery.request_id, delivery.random_word)
    }
}
