//! Deployment-change events consumed by the registry.

use inbound_core::{ConnectorElement, ProcessElement, ProcessId, TenantId};

/// The slice of deployed state one event replaces: a tenant's process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessScope {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// BPMN process id.
    pub process_id: ProcessId,
}

impl ProcessScope {
    /// Whether `element` belongs to this scope.
    pub fn contains(&self, element: &ProcessElement) -> bool {
        element.tenant_id == self.tenant_id && element.process_id == self.process_id
    }
}

/// The complete set of inbound elements now active for one process.
///
/// Elements of the process that are absent from `elements` are gone: their
/// listeners are deactivated unless another process still uses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentChangeEvent {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// BPMN process id.
    pub process_id: ProcessId,
    /// Monotonic revision of the process definitions, recorded on registrations.
    pub revision: u64,
    /// Every active inbound element of the process.
    pub elements: Vec<ConnectorElement>,
}

impl DeploymentChangeEvent {
    /// Event replacing the process's elements with `elements`.
    pub fn new(
        tenant_id: impl Into<TenantId>,
        process_id: impl Into<ProcessId>,
        revision: u64,
        elements: Vec<ConnectorElement>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            process_id: process_id.into(),
            revision,
            elements,
        }
    }

    /// Event stating that the process has no inbound elements anymore.
    pub fn removed(
        tenant_id: impl Into<TenantId>,
        process_id: impl Into<ProcessId>,
        revision: u64,
    ) -> Self {
        Self::new(tenant_id, process_id, revision, Vec::new())
    }

    /// The scope this event replaces.
    pub fn scope(&self) -> ProcessScope {
        ProcessScope {
            tenant_id: self.tenant_id.clone(),
            process_id: self.process_id.clone(),
        }
    }
}
