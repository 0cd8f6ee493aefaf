//! Runtime configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inbound_core::ConnectorType;
use inbound_correlation::{CorrelationEngine, ExpressionEvaluator, WorkflowEngineClient};
use inbound_telemetry::{InMemoryTelemetry, TelemetryService};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings of an [`InboundExecutableRegistry`](crate::InboundExecutableRegistry).
///
/// Every field has a default, so an empty TOML document is valid:
///
/// ```toml
/// activity_log_size = 20
/// status_report_interval = "15m"
///
/// [deduplication_scopes]
/// "io.camunda:webhook:1" = ["inbound.context", "inbound.method"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Entries kept in each registration's activity log.
    pub activity_log_size: usize,
    /// Buffer of the telemetry event bus.
    pub event_bus_capacity: usize,
    /// Time-to-live of published messages without an explicit one.
    #[serde(with = "humantime_serde")]
    pub default_message_ttl: Duration,
    /// Period of the background status report.
    #[serde(with = "humantime_serde")]
    pub status_report_interval: Duration,
    /// Property names that identify a listener, per connector type.
    ///
    /// Types without an entry hash all non-runtime properties.
    pub deduplication_scopes: HashMap<String, Vec<String>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            activity_log_size: 10,
            event_bus_capacity: 256,
            default_message_ttl: Duration::from_hours(1),
            status_report_interval: Duration::from_hours(1),
            deduplication_scopes: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Deduplication scope of a connector type; empty means "all properties".
    pub fn deduplication_scope(&self, connector_type: &ConnectorType) -> &[String] {
        self.deduplication_scopes
            .get(connector_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// In-memory telemetry sized by `event_bus_capacity`.
    pub fn telemetry(&self) -> Arc<dyn TelemetryService> {
        Arc::new(InMemoryTelemetry::with_capacity(self.event_bus_capacity))
    }

    /// Correlation engine publishing with `default_message_ttl`.
    pub fn correlation_engine(
        &self,
        engine: Arc<dyn WorkflowEngineClient>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        telemetry: Arc<dyn TelemetryService>,
    ) -> CorrelationEngine {
        CorrelationEngine::new(engine, evaluator, telemetry)
            .with_default_message_ttl(self.default_message_ttl)
    }
}
