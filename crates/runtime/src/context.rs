//! What an executable gets to work with once activated.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use inbound_core::{ConnectorElement, ConnectorType, DeduplicationId, ExecutableId, TenantId};
use inbound_correlation::{
    ActivationCheck, CorrelationEngine, CorrelationRequest, CorrelationResult, ExpressionError,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::activity::Activity;
use crate::details::ValidDetails;
use crate::error::{ContextError, ExecutableError};
use crate::health::Health;
use crate::registry::RegistryShared;

/// Placeholder written over sensitive property values.
pub const REDACTED: &str = "***";

/// Typed configuration of one connector type.
///
/// Dotted property names bind as nested objects, so `auth.token` lands in
/// `auth: { token }`. Values are strings as configured.
pub trait ConnectorProperties: DeserializeOwned {
    /// Property names (dotted) that must never be logged or exposed.
    /// A name also covers everything nested below it.
    const SENSITIVE_FIELDS: &'static [&'static str] = &[];
}

/// How the registry restarts a cancelled executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Attempts after the first restart.
    pub max_retries: u32,
    /// Wait before each attempt.
    pub backoff: Duration,
}

/// Read-only identity of the listener an executable serves.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorDefinition<'a> {
    /// Connector type.
    pub connector_type: &'a ConnectorType,
    /// Owning tenant.
    pub tenant_id: &'a TenantId,
    /// Listener key.
    pub deduplication_id: &'a DeduplicationId,
    /// Grouped elements.
    pub elements: &'a [ConnectorElement],
}

/// Back-channel from one executable instance to the registry.
///
/// Holds the registry weakly; once the registry is dropped every call is a
/// no-op.
#[derive(Clone)]
pub struct ExecutableHandle {
    registry: Weak<RegistryShared>,
    deduplication_id: DeduplicationId,
    executable_id: ExecutableId,
}

impl ExecutableHandle {
    pub(crate) fn new(
        registry: Weak<RegistryShared>,
        deduplication_id: DeduplicationId,
        executable_id: ExecutableId,
    ) -> Self {
        Self {
            registry,
            deduplication_id,
            executable_id,
        }
    }

    /// Listener key.
    pub fn deduplication_id(&self) -> &DeduplicationId {
        &self.deduplication_id
    }

    /// Instance id.
    pub fn executable_id(&self) -> ExecutableId {
        self.executable_id
    }

    /// Replace the health of this instance's registration.
    pub fn report_health(&self, health: Health) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .health
                .report_from(&self.deduplication_id, self.executable_id, health);
        }
    }

    /// Append to this instance's activity log.
    pub fn log(&self, activity: Activity) {
        if let Some(registry) = self.registry.upgrade() {
            registry.log_activity(&self.deduplication_id, self.executable_id, activity);
        }
    }

    /// Ask the registry to tear this instance down.
    pub fn cancel(&self, error: ExecutableError, restart: Option<RestartPolicy>) {
        if let Some(registry) = self.registry.upgrade() {
            registry.request_cancellation(
                self.deduplication_id.clone(),
                self.executable_id,
                error,
                restart,
            );
        }
    }
}

impl fmt::Debug for ExecutableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableHandle")
            .field("deduplication_id", &self.deduplication_id)
            .field("executable_id", &self.executable_id)
            .finish()
    }
}

/// Context passed to [`InboundExecutable::activate`](crate::InboundExecutable::activate).
#[derive(Clone)]
pub struct InboundContext {
    details: Arc<ValidDetails>,
    handle: ExecutableHandle,
    correlation: Arc<CorrelationEngine>,
}

impl InboundContext {
    /// Assemble a context.
    pub fn new(
        details: ValidDetails,
        handle: ExecutableHandle,
        correlation: Arc<CorrelationEngine>,
    ) -> Self {
        Self {
            details: Arc::new(details),
            handle,
            correlation,
        }
    }

    /// The listener this executable serves.
    pub fn definition(&self) -> ConnectorDefinition<'_> {
        ConnectorDefinition {
            connector_type: self.details.connector_type(),
            tenant_id: self.details.tenant_id(),
            deduplication_id: self.details.deduplication_id(),
            elements: self.details.elements(),
        }
    }

    /// Canonical raw properties, runtime keywords included.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        self.details.raw_properties()
    }

    /// Bind the connector properties to a typed configuration.
    pub fn bind_properties<T: ConnectorProperties>(&self) -> Result<T, ContextError> {
        let tree = nest(&self.details.first_element().connector_properties())?;
        serde_json::from_value(tree).map_err(|e| ContextError::Binding {
            message: e.to_string(),
        })
    }

    /// Connector properties with `T::SENSITIVE_FIELDS` masked, safe to log.
    pub fn redacted_properties<T: ConnectorProperties>(&self) -> BTreeMap<String, String> {
        redact(
            self.details.first_element().connector_properties(),
            T::SENSITIVE_FIELDS,
        )
    }

    /// Which element a payload would activate, without delivering it.
    pub fn can_activate(&self, variables: &Value) -> Result<ActivationCheck, ExpressionError> {
        self.correlation
            .can_activate(self.details.elements(), variables)
    }

    /// Deliver a payload to the workflow engine.
    pub async fn correlate(&self, request: CorrelationRequest) -> CorrelationResult {
        self.correlation
            .correlate_group(self.details.elements(), request)
            .await
    }

    /// Replace this executable's health.
    pub fn report_health(&self, health: Health) {
        self.handle.report_health(health);
    }

    /// Append to this executable's activity log.
    pub fn log(&self, activity: Activity) {
        self.handle.log(activity);
    }

    /// Ask the registry to tear this executable down, optionally restarting it.
    pub fn cancel(&self, error: ExecutableError, restart: Option<RestartPolicy>) {
        self.handle.cancel(error, restart);
    }

    /// Instance id of this executable.
    pub fn executable_id(&self) -> ExecutableId {
        self.handle.executable_id()
    }

    /// The back-channel, for executables that outlive the context borrow.
    pub fn handle(&self) -> &ExecutableHandle {
        &self.handle
    }
}

impl fmt::Debug for InboundContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundContext")
            .field("details", &self.details)
            .field("handle", &self.handle)
            .finish()
    }
}

/// Builds the context handed to `activate`.
pub trait ContextFactory: Send + Sync {
    /// Create a context for a valid group.
    fn create_context(
        &self,
        details: &ValidDetails,
        handle: ExecutableHandle,
    ) -> Result<InboundContext, ContextError>;
}

/// Context factory wiring every context to one correlation engine.
pub struct DefaultContextFactory {
    correlation: Arc<CorrelationEngine>,
}

impl DefaultContextFactory {
    /// Create a factory.
    pub fn new(correlation: Arc<CorrelationEngine>) -> Self {
        Self { correlation }
    }
}

impl ContextFactory for DefaultContextFactory {
    fn create_context(
        &self,
        details: &ValidDetails,
        handle: ExecutableHandle,
    ) -> Result<InboundContext, ContextError> {
        Ok(InboundContext::new(
            details.clone(),
            handle,
            Arc::clone(&self.correlation),
        ))
    }
}

/// Turn dotted keys into nested JSON objects.
fn nest(properties: &BTreeMap<String, String>) -> Result<Value, ContextError> {
    let mut root = Map::new();
    for (key, value) in properties {
        let mut segments: Vec<&str> = key.split('.').collect();
        let leaf = segments.pop().unwrap_or_default();
        let mut node = &mut root;
        for segment in segments {
            let child = node
                .entry(segment.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            node = child.as_object_mut().ok_or_else(|| ContextError::Binding {
                message: format!("property '{key}' conflicts with a scalar at '{segment}'"),
            })?;
        }
        if node.contains_key(leaf) {
            return Err(ContextError::Binding {
                message: format!("property '{key}' conflicts with a nested property"),
            });
        }
        node.insert(leaf.to_owned(), Value::String(value.clone()));
    }
    Ok(Value::Object(root))
}

fn redact(
    mut properties: BTreeMap<String, String>,
    sensitive: &[&str],
) -> BTreeMap<String, String> {
    for (key, value) in &mut properties {
        let hit = sensitive.iter().any(|field| {
            key == field
                || key
                    .strip_prefix(field)
                    .is_some_and(|rest| rest.starts_with('.'))
        });
        if hit {
            *value = REDACTED.to_owned();
        }
    }
    properties
}
