//! Randomness-backed rarity minting.
//!
//! A mint is a two-step protocol over an asynchronous randomness oracle:
//!
//! 1. **Request**: [`MintWorkflow::request_mint`] validates the payment,
//!    obtains a [`RequestId`] from the oracle and records who asked.
//! 2. **Fulfill**: the oracle later delivers a [`RandomWord`] for that id;
//!    [`MintWorkflow::on_fulfillment`] consumes the pending entry exactly once,
//!    maps the word to a rarity [`Category`] through the [`RarityTable`] and
//!    mints the token to the original requester.
//!
//! [`MockOracle`] is a synchronous stand-in for the oracle that lets callers
//! trigger fulfillment directly.

pub mod errors;
pub mod events;
pub mod ledger;
pub mod mock_oracle;
pub mod oracle;
pub mod rarity;
pub mod state;
pub mod store;
pub mod workflow;

pub use errors::{ErrorClass, MintError, MintResult};
pub use events::{EventSink, LogSink, MintEvent, RecordingSink};
pub use ledger::{InMemoryLedger, TokenLedger};
pub use mock_oracle::MockOracle;
pub use oracle::{Delivery, FulfillmentConsumer, RandomWord, RandomnessOracle, expand_random_word};
pub use rarity::{RarityBucket, RarityTable};
pub use state::{Category, MintedToken, PendingRequest, Requester, RequestId, TokenId};
pub use store::{InMemoryPendingStore, PendingRequestStore};
pub use workflow::{MintSettings, MintWorkflow, UnreconciledFulfillment};
