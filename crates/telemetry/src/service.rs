//! Telemetry service trait and the in-memory implementation.
//!
//! [`TelemetryService`] is the facade the registry and the correlation
//! engine report through. It provides access to the event bus and metrics.

use std::sync::Arc;

use crate::event::EventBus;
use crate::metrics::MetricsRegistry;

/// Default broadcast buffer of [`InMemoryTelemetry`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Telemetry service facade.
///
/// Shared via `Arc<dyn TelemetryService>` across the registry, the
/// correlation engine and monitoring code.
pub trait TelemetryService: Send + Sync {
    /// Access the event bus for emitting and subscribing to events.
    fn event_bus(&self) -> &EventBus;

    /// Access the metrics registry for recording metrics.
    fn metrics(&self) -> &MetricsRegistry;
}

/// Telemetry kept entirely in process memory.
///
/// Events reach whoever subscribed to the bus; metrics are readable through
/// [`MetricsRegistry`] but never exported.
pub struct InMemoryTelemetry {
    event_bus: EventBus,
    metrics: MetricsRegistry,
}

impl InMemoryTelemetry {
    /// Create a service with the default event capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a service whose event bus buffers `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            event_bus: EventBus::new(capacity),
            metrics: MetricsRegistry::new(),
        }
    }

    /// Create as an `Arc<dyn TelemetryService>` for dependency injection.
    #[must_use]
    pub fn arc() -> Arc<dyn TelemetryService> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryService for InMemoryTelemetry {
    fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }
}
