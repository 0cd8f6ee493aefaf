//! Per-key registration state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use inbound_core::{DeduplicationId, ExecutableId};
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityLog};
use crate::details::InboundConnectorDetails;
use crate::executable::InboundExecutable;
use crate::health::Health;
use crate::query::RegistrationView;

/// Where the last activation attempt of a registration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// An executable is running.
    Activated,
    /// The element group is inconsistent.
    InvalidDefinition,
    /// No executable is registered for the connector type.
    ConnectorNotRegistered,
    /// Context creation or `activate` failed.
    FailedToActivate,
    /// The executable cancelled itself.
    Cancelled,
    /// The executable is being stopped, to be replaced or removed. Only
    /// visible while the key's transition is running.
    Deactivating,
}

impl RegistrationStatus {
    /// Whether redelivering unchanged details should leave the registration
    /// alone. Failed attempts are retried on redelivery; an invalid group
    /// would only fail the same way again.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Activated | Self::InvalidDefinition)
    }
}

/// The registry's record for one deduplication id.
pub(crate) struct ExecutableRegistration {
    pub(crate) details: InboundConnectorDetails,
    pub(crate) executable: Option<Arc<dyn InboundExecutable>>,
    pub(crate) executable_id: Option<ExecutableId>,
    pub(crate) status: RegistrationStatus,
    pub(crate) health: Health,
    pub(crate) activated_at: Option<DateTime<Utc>>,
    pub(crate) revision: u64,
    pub(crate) activity_log: ActivityLog,
}

impl ExecutableRegistration {
    pub(crate) fn view(&self) -> RegistrationView {
        RegistrationView {
            executable_id: self.executable_id,
            connector_type: self.details.connector_type().clone(),
            tenant_id: self.details.tenant_id().clone(),
            deduplication_id: self.details.deduplication_id().clone(),
            status: self.status,
            health: self.health.clone(),
            elements: self
                .details
                .elements()
                .iter()
                .map(|e| e.element().clone())
                .collect(),
            activated_at: self.activated_at,
            revision: self.revision,
            activity_log: self.activity_log.entries(),
        }
    }
}

/// Reports from an executable whose `activate` has not returned yet.
pub(crate) struct InFlight {
    pub(crate) executable_id: ExecutableId,
    pub(crate) health: Option<Health>,
    pub(crate) activity: Vec<Activity>,
}

impl InFlight {
    pub(crate) fn new(executable_id: ExecutableId) -> Self {
        Self {
            executable_id,
            health: None,
            activity: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct KeyState {
    pub(crate) registration: Option<ExecutableRegistration>,
    pub(crate) in_flight: Option<InFlight>,
}

/// One slot of the registry.
///
/// `transition` serializes activation, deactivation and cancellation of the
/// key and is held across their `await`s; its value is `true` once the slot
/// has been removed from the map. `state` is only ever held for copies and
/// small writes, so queries and health reports never wait on a slow
/// `activate`.
pub(crate) struct KeyEntry {
    pub(crate) transition: Arc<tokio::sync::Mutex<bool>>,
    pub(crate) state: parking_lot::Mutex<KeyState>,
}

impl KeyEntry {
    pub(crate) fn new() -> Self {
        Self {
            transition: Arc::new(tokio::sync::Mutex::new(false)),
            state: parking_lot::Mutex::new(KeyState::default()),
        }
    }
}

pub(crate) type EntryMap = DashMap<DeduplicationId, Arc<KeyEntry>>;
