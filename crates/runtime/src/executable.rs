//! Executable contract and the connector registry that creates instances.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use inbound_core::ConnectorType;

use crate::context::InboundContext;
use crate::error::{ExecutableError, FactoryError};

/// A long-running listener: webhook endpoint, poller, queue consumer.
///
/// The registry calls `activate` once per instance and `deactivate` at most
/// once after a successful `activate`. Both may be slow; they only hold the
/// lock of their own deduplication id.
#[async_trait]
pub trait InboundExecutable: Send + Sync {
    /// Start listening. The context stays valid for the instance's lifetime.
    async fn activate(&self, context: InboundContext) -> Result<(), ExecutableError>;

    /// Stop listening and release resources.
    async fn deactivate(&self) -> Result<(), ExecutableError>;
}

/// Resolves a connector type to a fresh executable instance.
pub trait ExecutableFactory: Send + Sync {
    /// Create an instance for `connector_type`.
    fn get_instance(
        &self,
        connector_type: &ConnectorType,
    ) -> Result<Arc<dyn InboundExecutable>, FactoryError>;
}

type Constructor = Arc<dyn Fn() -> Arc<dyn InboundExecutable> + Send + Sync>;

/// Thread-safe table of executable constructors keyed by connector type.
///
/// # Examples
///
/// ```rust,ignore
/// let connectors = ConnectorRegistry::new();
/// connectors.register("io.camunda:webhook:1", || Arc::new(WebhookExecutable::default()));
/// let executable = connectors.get_instance(&ConnectorType::new("io.camunda:webhook:1"))?;
/// ```
pub struct ConnectorRegistry {
    constructors: DashMap<ConnectorType, Constructor>,
}

impl ConnectorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: DashMap::new(),
        }
    }

    /// Register a constructor. An existing one for the same type is replaced.
    pub fn register<F>(&self, connector_type: impl Into<ConnectorType>, constructor: F)
    where
        F: Fn() -> Arc<dyn InboundExecutable> + Send + Sync + 'static,
    {
        let connector_type = connector_type.into();
        tracing::info!(connector_type = %connector_type, "registered inbound connector");
        self.constructors
            .insert(connector_type, Arc::new(constructor));
    }

    /// Whether a constructor is registered for the type.
    #[must_use]
    pub fn contains(&self, connector_type: &ConnectorType) -> bool {
        self.constructors.contains_key(connector_type)
    }

    /// Remove a constructor. Returns `true` if one was registered.
    pub fn remove(&self, connector_type: &ConnectorType) -> bool {
        self.constructors.remove(connector_type).is_some()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Registered types, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<ConnectorType> {
        let mut types: Vec<_> = self.constructors.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableFactory for ConnectorRegistry {
    fn get_instance(
        &self,
        connector_type: &ConnectorType,
    ) -> Result<Arc<dyn InboundExecutable>, FactoryError> {
        // Clone the constructor out so the shard lock is released before it runs.
        let constructor = self
            .constructors
            .get(connector_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FactoryError::NotRegistered {
                connector_type: connector_type.clone(),
            })?;
        Ok(constructor())
    }
}
