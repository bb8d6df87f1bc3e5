use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

use crate::state::{Category, Requester, RequestId, TokenId};

/// Observable workflow events. Consumed by operators and tests, never
/// interpreted by the workflow itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum MintEvent {
    /// Emitted once a request is registered and awaiting the oracle.
    MintRequested {
        request_id: RequestId,
        requester: Requester,
    },
    /// Emitted once per successful fulfillment, after the token is minted.
    MintCompleted {
        token_id: TokenId,
        category: Category,
        owner: Requester,
    },
}

impl MintEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MintEvent::MintRequested { .. } => "MintRequested",
            MintEvent::MintCompleted { .. } => "MintCompleted",
        }
    }
}

/// Destination for [`MintEvent`]s. Emission is infallible and must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MintEvent);
}

/// Writes every event to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: MintEvent) {
        match &event {
            MintEvent::MintRequested {
                request_id,
                requester,
            } => info!(%request_id, %requester, "MintRequested"),
            MintEvent::MintCompleted {
                token_id,
                category,
                owner,
            } => info!(%token_id, %category, %owner, "MintCompleted"),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MintEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MintEvent> {
        self.lock().clone()
    }

    /// Number of `MintCompleted` events emitted for tokens owned by `owner`.
    pub fn completed_for(&self, owner: &Requester) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MintEvent::MintCompleted { owner: o, .. } if o == owner))
            .count()
    }

    pub fn completed(&self) -> Vec<MintEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MintEvent::MintCompleted { .. }))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MintEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: MintEvent) {
        self.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(MintEvent::MintRequested {
            request_id: RequestId(1),
            requester: Requester::new("alice"),
        });
        sink.emit(MintEvent::MintCompleted {
            token_id: TokenId(0),
            category: Category(2),
            owner: Requester::new("alice"),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "MintRequested");
        assert_eq!(events[1].name(), "MintCompleted");
        assert_eq!(sink.completed_for(&Requester::new("alice")), 1);
        assert_eq!(sink.completed_for(&Requester::new("bob")), 0);
    }

    #[test]
    fn recording_survives_poisoned_lock() {
        let sink = RecordingSink::new();
        sink.emit(MintEvent::MintRequested {
            request_id: RequestId(1),
            requester: Requester::new("alice"),
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sink.events.lock().unwrap();
            panic!("poison the sink");
        }));
        assert!(result.is_err());
        assert!(sink.events.is_poisoned());

        sink.emit(MintEvent::MintRequested {
            request_id: RequestId(2),
            requester: Requester::new("bob"),
        });
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn log_sink_accepts_every_event() {
        let sink = LogSink;
        sink.emit(MintEvent::MintRequested {
            request_id: RequestId(7),
            requester: Requester::new("dave"),
        });
        sink.emit(MintEvent::MintCompleted {
            token_id: TokenId(0),
            category: Category(0),
            owner: Requester::new("dave"),
        });
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = MintEvent::MintCompleted {
            token_id: TokenId(3),
            category: Category(1),
            owner: Requester::new("carol"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "MintCompleted");
        assert_eq!(json["token_id"], 3);
        assert_eq!(json["category"], 1);
        assert_eq!(json["owner"], "carol");
    }
}
