//! Health state of inbound registrations and the monitor that updates it.
//!
//! This module provides:
//! - Health types ([`Health`], [`HealthStatus`], [`HealthError`])
//! - [`HealthMonitor`], which reads and writes health on the registry's live
//!   entries under the same per-key lock as activation

use std::collections::BTreeMap;
use std::sync::Arc;

use inbound_core::{DeduplicationId, ExecutableId};
use inbound_telemetry::{InboundEvent, TelemetryService};
use serde::{Deserialize, Serialize};

use crate::registration::{EntryMap, RegistrationStatus};

// ---------------------------------------------------------------------------
// Health types
// ---------------------------------------------------------------------------

/// UP or DOWN. There is no unknown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Listening.
    Up,
    /// Not listening, see the error.
    Down,
}

/// Most recent error of a DOWN registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthError {
    /// Human-readable message.
    pub message: String,
    /// Underlying cause, when the error had a source.
    pub cause: Option<String>,
}

/// Health of one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current status.
    pub status: HealthStatus,
    /// Error, present for DOWN.
    pub error: Option<HealthError>,
    /// Free-form details an executable may attach, e.g. a poll timestamp.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Health {
    /// Healthy.
    #[must_use]
    pub fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            error: None,
            details: BTreeMap::new(),
        }
    }

    /// Unhealthy with a message.
    pub fn down(message: impl Into<String>) -> Self {
        Self::down_with_cause(message, None)
    }

    /// Unhealthy with a message and an optional cause.
    pub fn down_with_cause(message: impl Into<String>, cause: Option<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            error: Some(HealthError {
                message: message.into(),
                cause,
            }),
            details: BTreeMap::new(),
        }
    }

    /// Unhealthy with the error's `Display` as the message and its source as
    /// the cause.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::down_with_cause(error.to_string(), error.source().map(ToString::to_string))
    }

    /// Attach a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Whether the status is UP.
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }

    /// Error message of a DOWN health.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Per-key health reads and writes.
///
/// Holds no state of its own: every call goes to the registration stored in
/// the registry. Writes are last-write-wins; only the current health is kept.
#[derive(Clone)]
pub struct HealthMonitor {
    entries: Arc<EntryMap>,
    telemetry: Arc<dyn TelemetryService>,
}

impl HealthMonitor {
    pub(crate) fn new(entries: Arc<EntryMap>, telemetry: Arc<dyn TelemetryService>) -> Self {
        Self { entries, telemetry }
    }

    /// Overwrite the health of a registration.
    ///
    /// Returns `false` when no registration exists for `key`.
    pub fn report(&self, key: &DeduplicationId, health: Health) -> bool {
        let Some(entry) = self.entries.get(key).map(|e| Arc::clone(e.value())) else {
            return false;
        };
        let previous = {
            let mut state = entry.state.lock();
            let Some(registration) = state.registration.as_mut() else {
                return false;
            };
            std::mem::replace(&mut registration.health, health.clone())
        };
        self.transition(key, &previous, &health);
        true
    }

    /// Current health of a registration.
    pub fn get(&self, key: &DeduplicationId) -> Option<Health> {
        let entry = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
        let state = entry.state.lock();
        state.registration.as_ref().map(|r| r.health.clone())
    }

    /// Health reported by an executable about itself.
    ///
    /// Applied only when `executable_id` is the live instance of `key`, or the
    /// instance whose `activate` is still running (kept until the attempt
    /// completes). Reports from replaced instances are dropped.
    pub(crate) fn report_from(
        &self,
        key: &DeduplicationId,
        executable_id: ExecutableId,
        health: Health,
    ) -> bool {
        let Some(entry) = self.entries.get(key).map(|e| Arc::clone(e.value())) else {
            return false;
        };
        let previous = {
            let mut state = entry.state.lock();
            if let Some(in_flight) = state
                .in_flight
                .as_mut()
                .filter(|f| f.executable_id == executable_id)
            {
                in_flight.health = Some(health);
                return true;
            }
            match state.registration.as_mut() {
                Some(registration)
                    if registration.executable_id == Some(executable_id)
                        && registration.status == RegistrationStatus::Activated =>
                {
                    std::mem::replace(&mut registration.health, health.clone())
                }
                _ => {
                    tracing::debug!(
                        deduplication_id = %key,
                        executable_id = %executable_id,
                        "ignoring health report from a replaced executable"
                    );
                    return false;
                }
            }
        };
        self.transition(key, &previous, &health);
        true
    }

    /// Emit [`InboundEvent::HealthChanged`] when the status flipped.
    pub(crate) fn transition(&self, key: &DeduplicationId, previous: &Health, current: &Health) {
        if previous.status == current.status {
            return;
        }
        match current.status {
            HealthStatus::Up => tracing::info!(deduplication_id = %key, "connector is UP"),
            HealthStatus::Down => tracing::warn!(
                deduplication_id = %key,
                error = current.error_message().unwrap_or_default(),
                "connector is DOWN"
            ),
        }
        self.telemetry.event_bus().emit(InboundEvent::HealthChanged {
            deduplication_id: key.clone(),
            healthy: current.is_up(),
            error: current.error_message().map(str::to_owned),
        });
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn down_carries_message() {
        let health = Health::down("failed");
        assert!(!health.is_up());
        assert_eq!(health.error_message(), Some("failed"));
    }

    #[test]
    fn from_error_keeps_cause() {
        let err = crate::error::ExecutableError::with_source(
            "listener stopped",
            std::io::Error::other("port in use"),
        );
        let health = Health::from_error(&err);
        assert_eq!(
            health.error,
            Some(HealthError {
                message: "listener stopped".into(),
                cause: Some("port in use".into()),
            })
        );
    }

    #[test]
    fn serializes_status_uppercase() {
        let json = serde_json::to_value(Health::up().with_detail("lastPoll", "12:00")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "UP", "error": null, "details": { "lastPoll": "12:00" } })
        );
    }
}
