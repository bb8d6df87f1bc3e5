use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::errors::{MintError, MintResult};
use crate::state::{PendingRequest, RequestId};

/// Storage for in-flight mint requests, keyed by oracle request id.
///
/// Implementations must be linearizable per key: an entry can be taken at
/// most once, and `put` never overwrites an entry that is still pending.
pub trait PendingRequestStore: Send + Sync {
    /// Register a new pending request. Fails with `DuplicateRequest` if the id
    /// is already pending.
    fn put(&self, request: PendingRequest) -> MintResult<()>;

    /// Atomically remove and return the entry. Fails with `UnknownRequest` if
    /// no entry exists.
    fn take(&self, request_id: RequestId) -> MintResult<PendingRequest>;

    fn get(&self, request_id: RequestId) -> Option<PendingRequest>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe in-memory store backed by a sharded concurrent map.
///
/// Each key lives in one shard guarded by its own lock, so operations on
/// distinct ids do not contend on a global lock.
#[derive(Default)]
pub struct InMemoryPendingStore {
    pending: DashMap<RequestId, PendingRequest>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of all pending requests, in no particular order.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }
}

impl PendingRequestStore for InMemoryPendingStore {
    fn put(&self, request: PendingRequest) -> MintResult<()> {
        match self.pending.entry(request.request_id) {
            Entry::Occupied(_) => Err(MintError::DuplicateRequest(request.request_id)),
            Entry::Vacant(slot) => {
                slot.insert(request);
                Ok(())
            }
        }
    }

    fn take(&self, request_id: RequestId) -> MintResult<PendingRequest> {
        self.pending
            .remove(&request_id)
            .map(|(_, request)| request)
            .ok_or(MintError::UnknownRequest(request_id))
    }

    fn get(&self, request_id: RequestId) -> Option<PendingRequest> {
        self.pending.get(&request_id).map(|entry| entry.value().clone())
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}
