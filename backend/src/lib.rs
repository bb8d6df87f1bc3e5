//! Mint backend service.
//!
//! Wires a [`MintWorkflow`] to an in-process HMAC randomness coordinator and
//! exposes it over HTTP. Three subsystems run concurrently:
//!
//! - **Listener**: turns `MintRequested` events into oracle deliveries.
//! - **Fulfiller**: hands deliveries to the workflow, bounded by a semaphore.
//! - **HTTP server**: mint intake and lookups plus probes.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod fulfiller;
pub mod listener;
pub mod metrics;
pub mod vrf;

use random_mint::{InMemoryLedger, InMemoryPendingStore, MintWorkflow};

use crate::coordinator::HmacCoordinator;
use crate::listener::ChannelSink;

/// The workflow as assembled by the service binary.
pub type ServiceWorkflow =
    MintWorkflow<HmacCoordinator, InMemoryPendingStore, InMemoryLedger, ChannelSink>;
