//! Read-side of the registry.

use chrono::{DateTime, Utc};
use inbound_core::{
    ConnectorType, DeduplicationId, ElementId, ExecutableId, ProcessElement, ProcessId, TenantId,
};
use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::details::InboundConnectorDetails;
use crate::health::Health;
use crate::registration::RegistrationStatus;

/// Filter over registrations. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveExecutableQuery {
    /// Owning tenant.
    pub tenant_id: Option<TenantId>,
    /// Any grouped element has this element id.
    pub element_id: Option<ElementId>,
    /// Connector type.
    pub connector_type: Option<ConnectorType>,
    /// Listener key.
    pub deduplication_id: Option<DeduplicationId>,
    /// Any grouped element belongs to this process.
    pub process_id: Option<ProcessId>,
}

impl ActiveExecutableQuery {
    /// Match everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a tenant.
    pub fn with_tenant_id(mut self, tenant_id: impl Into<TenantId>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Restrict to listeners containing an element id.
    pub fn with_element_id(mut self, element_id: impl Into<ElementId>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// Restrict to a connector type.
    pub fn with_connector_type(mut self, connector_type: impl Into<ConnectorType>) -> Self {
        self.connector_type = Some(connector_type.into());
        self
    }

    /// Restrict to one key.
    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<DeduplicationId>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    /// Restrict to listeners containing an element of a process.
    pub fn with_process_id(mut self, process_id: impl Into<ProcessId>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    pub(crate) fn matches(&self, details: &InboundConnectorDetails) -> bool {
        let elements = details.elements();
        self.tenant_id.as_ref().is_none_or(|t| details.tenant_id() == t)
            && self
                .connector_type
                .as_ref()
                .is_none_or(|ty| details.connector_type() == ty)
            && self
                .deduplication_id
                .as_ref()
                .is_none_or(|id| details.deduplication_id() == id)
            && self
                .element_id
                .as_ref()
                .is_none_or(|id| elements.iter().any(|e| e.element_id() == id))
            && self
                .process_id
                .as_ref()
                .is_none_or(|id| elements.iter().any(|e| &e.element().process_id == id))
    }
}

/// Copy of one registration, taken under its key's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationView {
    /// Live executable instance, if any.
    pub executable_id: Option<ExecutableId>,
    /// Connector type.
    pub connector_type: ConnectorType,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Listener key.
    pub deduplication_id: DeduplicationId,
    /// Outcome of the last activation attempt.
    pub status: RegistrationStatus,
    /// Current health.
    pub health: Health,
    /// Grouped elements.
    pub elements: Vec<ProcessElement>,
    /// When the live executable was activated.
    pub activated_at: Option<DateTime<Utc>>,
    /// Deployment revision of the last activation attempt.
    pub revision: u64,
    /// Recent activity, oldest first.
    pub activity_log: Vec<Activity>,
}
