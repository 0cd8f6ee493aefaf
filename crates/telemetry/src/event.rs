//! Event bus for inbound connector lifecycle events.
//!
//! Uses [`tokio::sync::broadcast`] for fan-out delivery to multiple subscribers.
//! Events are fire-and-forget projections -- dropping them is acceptable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use inbound_core::{ConnectorType, DeduplicationId, ElementId, ExecutableId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Inbound connector lifecycle event.
///
/// Emitted by the executable registry and the correlation engine.
/// They are projections, **not** the source of truth: the registry is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InboundEvent {
    /// An executable was activated.
    Activated {
        /// Listener key.
        deduplication_id: DeduplicationId,
        /// Connector type of the executable.
        connector_type: ConnectorType,
        /// Instance id minted for this activation.
        executable_id: ExecutableId,
        /// How long `activate` took.
        duration: Duration,
    },
    /// An activation attempt ended without a live executable.
    ActivationFailed {
        /// Listener key.
        deduplication_id: DeduplicationId,
        /// Connector type of the group (best effort for invalid groups).
        connector_type: ConnectorType,
        /// Failure kind, e.g. `invalid_definition`.
        kind: String,
        /// Error description.
        error: String,
    },
    /// An executable was deactivated.
    Deactivated {
        /// Listener key.
        deduplication_id: DeduplicationId,
        /// Connector type of the executable.
        connector_type: ConnectorType,
    },
    /// The health status of a registration flipped.
    HealthChanged {
        /// Listener key.
        deduplication_id: DeduplicationId,
        /// `true` when the new status is UP.
        healthy: bool,
        /// Error message of a DOWN status.
        error: Option<String>,
    },
    /// An executable asked to be torn down.
    Cancelled {
        /// Listener key.
        deduplication_id: DeduplicationId,
        /// Reason given by the executable.
        error: String,
        /// Whether a restart was requested.
        restart: bool,
    },
    /// A payload was delivered to the workflow engine.
    Correlated {
        /// Connector type of the element.
        connector_type: ConnectorType,
        /// Element the payload was correlated to.
        element_id: ElementId,
        /// Success kind, e.g. `message_published`.
        outcome: String,
    },
    /// A payload could not be delivered.
    CorrelationFailed {
        /// Connector type of the executable.
        connector_type: ConnectorType,
        /// Failure reason code.
        reason: String,
        /// Error description.
        message: String,
    },
}

impl InboundEvent {
    /// Listener key the event refers to, if any.
    pub fn deduplication_id(&self) -> Option<&DeduplicationId> {
        match self {
            Self::Activated {
                deduplication_id, ..
            }
            | Self::ActivationFailed {
                deduplication_id, ..
            }
            | Self::Deactivated {
                deduplication_id, ..
            }
            | Self::HealthChanged {
                deduplication_id, ..
            }
            | Self::Cancelled {
                deduplication_id, ..
            } => Some(deduplication_id),
            Self::Correlated { .. } | Self::CorrelationFailed { .. } => None,
        }
    }
}

/// Broadcast-based event bus.
///
/// Delivers events to all active subscribers. If no subscribers are
/// listening, events are silently dropped (fire-and-forget).
pub struct EventBus {
    sender: broadcast::Sender<InboundEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// When the channel is full, the oldest events are dropped (lagging
    /// subscribers skip ahead).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns silently if there are no active subscribers.
    pub fn emit(&self, event: InboundEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("emitted", &self.total_emitted())
            .finish()
    }
}

/// Subscription handle for receiving events from the [`EventBus`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<InboundEvent>,
}

impl EventSubscriber {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Lagged events are skipped. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<InboundEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
