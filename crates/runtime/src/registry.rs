//! The executable registry: which listeners run, and in what state.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::join_all;
use inbound_core::{ConnectorElement, ConnectorType, DeduplicationId, ExecutableId};
use inbound_correlation::CorrelationEngine;
use inbound_telemetry::metrics::{
    ACTIVATION_DURATION_SECONDS, ACTIVATION_FAILURES_TOTAL, ACTIVATIONS_TOTAL, ACTIVE_EXECUTABLES,
    DEACTIVATIONS_TOTAL,
};
use inbound_telemetry::{InboundEvent, TelemetryService};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::activity::{Activity, ActivityLog};
use crate::config::RuntimeConfig;
use crate::context::{ContextFactory, DefaultContextFactory, ExecutableHandle, RestartPolicy};
use crate::details::{self, InboundConnectorDetails, ValidDetails};
use crate::error::{ActivationError, ExecutableError};
use crate::event::{DeploymentChangeEvent, ProcessScope};
use crate::executable::{ExecutableFactory, InboundExecutable};
use crate::health::{Health, HealthMonitor};
use crate::query::{ActiveExecutableQuery, RegistrationView};
use crate::registration::{EntryMap, ExecutableRegistration, InFlight, KeyEntry, RegistrationStatus};

/// Owns the mapping from deduplication id to registration.
///
/// Construct one per process and share it by reference or `Arc`. Cloning is
/// cheap and yields a handle to the same registry.
///
/// # Locking
///
/// Every key has its own transition lock, held across `activate` and
/// `deactivate`; keys never wait for each other. Events for the same
/// process are serialized so their removals cannot interleave. Queries copy
/// each registration under a short per-key lock and never wait for a
/// running activation, so a result is consistent per key but not across
/// keys.
#[derive(Clone)]
pub struct InboundExecutableRegistry {
    shared: Arc<RegistryShared>,
}

pub(crate) struct RegistryShared {
    entries: Arc<EntryMap>,
    scope_locks: DashMap<ProcessScope, Arc<tokio::sync::Mutex<()>>>,
    factory: Arc<dyn ExecutableFactory>,
    context_factory: Arc<dyn ContextFactory>,
    pub(crate) health: HealthMonitor,
    telemetry: Arc<dyn TelemetryService>,
    config: RuntimeConfig,
}

/// Per-type count of running executables.
pub type StatusReport = BTreeMap<ConnectorType, usize>;

impl InboundExecutableRegistry {
    /// Create a registry.
    pub fn new(
        factory: Arc<dyn ExecutableFactory>,
        context_factory: Arc<dyn ContextFactory>,
        telemetry: Arc<dyn TelemetryService>,
        config: RuntimeConfig,
    ) -> Self {
        let entries = Arc::new(EntryMap::new());
        let health = HealthMonitor::new(Arc::clone(&entries), Arc::clone(&telemetry));
        Self {
            shared: Arc::new(RegistryShared {
                entries,
                scope_locks: DashMap::new(),
                factory,
                context_factory,
                health,
                telemetry,
                config,
            }),
        }
    }

    /// Create a registry whose contexts correlate through `correlation`.
    pub fn with_correlation(
        factory: Arc<dyn ExecutableFactory>,
        correlation: Arc<CorrelationEngine>,
        telemetry: Arc<dyn TelemetryService>,
        config: RuntimeConfig,
    ) -> Self {
        Self::new(
            factory,
            Arc::new(DefaultContextFactory::new(correlation)),
            telemetry,
            config,
        )
    }

    /// Reconcile the registry with the new state of one process.
    ///
    /// Never fails: every affected key ends up activated, recorded DOWN, or
    /// removed.
    pub async fn handle_event(&self, event: DeploymentChangeEvent) {
        self.shared.handle_event(event).await;
    }

    /// Snapshot of the registrations matching `query`, sorted by key.
    ///
    /// A key whose executable is being replaced or removed shows
    /// [`RegistrationStatus::Deactivating`] until the transition completes.
    pub fn query(&self, query: &ActiveExecutableQuery) -> Vec<RegistrationView> {
        self.shared.query(query)
    }

    /// Health of every registration folded into one: UP when all are UP.
    pub fn aggregate_health(&self) -> Health {
        let views = self.query(&ActiveExecutableQuery::new());
        let down = views.iter().filter(|v| !v.health.is_up()).count();
        if down == 0 {
            Health::up()
        } else {
            Health::down(format!("{down} of {} connectors are down", views.len()))
        }
    }

    /// Health reads and writes by key.
    pub fn health_monitor(&self) -> &HealthMonitor {
        &self.shared.health
    }

    /// Number of running executables per connector type.
    pub fn status_report(&self) -> StatusReport {
        self.shared.status_report()
    }

    /// Log [`status_report`](Self::status_report) at `info`.
    pub fn log_status_report(&self) {
        self.shared.log_status_report();
    }

    /// Log the status report every `status_report_interval` until `cancel`.
    pub fn spawn_status_reporter(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let period = shared
            .config
            .status_report_interval
            .max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => shared.log_status_report(),
                }
            }
        })
    }

    /// Deactivate and remove every registration.
    pub async fn shutdown(&self) {
        let keys: Vec<DeduplicationId> = self
            .shared
            .entries
            .iter()
            .map(|e| e.key().clone())
            .collect();
        tracing::info!(count = keys.len(), "shutting down inbound executables");
        join_all(keys.into_iter().map(|key| self.shared.remove_key(key))).await;
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.shared
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| entry.state.lock().registration.is_some())
            .count()
    }

    /// Whether there are no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InboundExecutableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundExecutableRegistry")
            .field("entries", &self.shared.entries.len())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl RegistryShared {
    // -----------------------------------------------------------------------
    // Deployment events
    // -----------------------------------------------------------------------

    async fn handle_event(self: &Arc<Self>, event: DeploymentChangeEvent) {
        let scope = event.scope();
        let scope_lock = Arc::clone(
            self.scope_locks
                .entry(scope.clone())
                .or_default()
                .value(),
        );
        {
            let _scope_guard = scope_lock.lock().await;
            self.reconcile_scope(&scope, event).await;
        }
        drop(scope_lock);
        // Nobody else holds or waits for the lock: drop it, the next event
        // for this process creates a fresh one.
        self.scope_locks
            .remove_if(&scope, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Caller holds the scope lock.
    async fn reconcile_scope(
        self: &Arc<Self>,
        scope: &ProcessScope,
        event: DeploymentChangeEvent,
    ) {
        tracing::debug!(
            tenant_id = %scope.tenant_id,
            process_id = %scope.process_id,
            revision = event.revision,
            elements = event.elements.len(),
            "handling deployment change"
        );

        let mut groups: BTreeMap<DeduplicationId, Vec<ConnectorElement>> = BTreeMap::new();
        for element in event.elements {
            if !scope.contains(element.element()) {
                tracing::warn!(
                    tenant_id = %element.tenant_id(),
                    process_id = %element.element().process_id,
                    element_id = %element.element_id(),
                    "skipping element outside the event's process"
                );
                continue;
            }
            let scope_properties = self.config.deduplication_scope(element.connector_type());
            match element.deduplication_id(scope_properties) {
                Ok(key) => groups.entry(key).or_default().push(element),
                Err(e) => tracing::error!(
                    tenant_id = %element.tenant_id(),
                    element_id = %element.element_id(),
                    error = %e,
                    "cannot derive deduplication id, skipping element"
                ),
            }
        }

        let mut keys: BTreeSet<DeduplicationId> = groups.keys().cloned().collect();
        keys.extend(self.keys_in_scope(scope));

        join_all(keys.into_iter().map(|key| {
            let elements = groups.remove(&key).unwrap_or_default();
            self.reconcile(key, elements, scope, event.revision)
        }))
        .await;
    }

    /// Bring one key in line with the event's elements for it.
    async fn reconcile(
        self: &Arc<Self>,
        key: DeduplicationId,
        mut elements: Vec<ConnectorElement>,
        scope: &ProcessScope,
        revision: u64,
    ) {
        let (entry, mut guard) = self.lock_entry(&key).await;

        let previous = {
            let state = entry.state.lock();
            state
                .registration
                .as_ref()
                .map(|r| (r.details.clone(), r.status))
        };
        if let Some((details, _)) = &previous {
            // Elements of other processes sharing the key stay.
            elements.extend(
                details
                    .elements()
                    .iter()
                    .filter(|e| !scope.contains(e.element()))
                    .cloned(),
            );
        }

        if elements.is_empty() {
            self.deactivate_entry(&key, &entry).await;
            self.retire(&key, &entry, &mut guard);
            return;
        }

        let details = details::group(key.clone(), elements);
        if let Some((previous_details, status)) = previous {
            if previous_details != details {
                tracing::info!(deduplication_id = %key, "connector changed, reactivating");
            } else if status.is_settled() {
                tracing::debug!(deduplication_id = %key, "connector unchanged");
                return;
            } else {
                tracing::info!(
                    deduplication_id = %key,
                    previous_status = ?status,
                    "retrying failed connector"
                );
            }
            self.deactivate_entry(&key, &entry).await;
        }

        self.activate_entry(&key, &entry, details, revision).await;
    }

    /// Lock the transition of `key`, creating its slot if needed.
    async fn lock_entry(
        &self,
        key: &DeduplicationId,
    ) -> (Arc<KeyEntry>, OwnedMutexGuard<bool>) {
        loop {
            let entry = Arc::clone(
                self.entries
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(KeyEntry::new()))
                    .value(),
            );
            let guard = Arc::clone(&entry.transition).lock_owned().await;
            if !*guard {
                return (entry, guard);
            }
            // Removed while we waited; the next round sees a fresh slot.
        }
    }

    fn retire(&self, key: &DeduplicationId, entry: &Arc<KeyEntry>, guard: &mut bool) {
        *guard = true;
        entry.state.lock().registration = None;
        self.entries.remove_if(key, |_, current| Arc::ptr_eq(current, entry));
    }

    async fn remove_key(self: &Arc<Self>, key: DeduplicationId) {
        let (entry, mut guard) = self.lock_entry(&key).await;
        self.deactivate_entry(&key, &entry).await;
        self.retire(&key, &entry, &mut guard);
    }

    /// Keys with at least one element in `scope`.
    fn keys_in_scope(&self, scope: &ProcessScope) -> Vec<DeduplicationId> {
        self.snapshot()
            .into_iter()
            .filter(|(_, entry)| {
                entry.state.lock().registration.as_ref().is_some_and(|r| {
                    r.details
                        .elements()
                        .iter()
                        .any(|e| scope.contains(e.element()))
                })
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// Copy out the slots so no map shard stays locked while a key is inspected.
    fn snapshot(&self) -> Vec<(DeduplicationId, Arc<KeyEntry>)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Activation
    // -----------------------------------------------------------------------

    /// Attempt activation and record the outcome. Returns `true` on success.
    ///
    /// Caller holds the key's transition lock.
    async fn activate_entry(
        self: &Arc<Self>,
        key: &DeduplicationId,
        entry: &Arc<KeyEntry>,
        details: InboundConnectorDetails,
        revision: u64,
    ) -> bool {
        let connector_type = details.connector_type().clone();
        let started = Instant::now();
        let outcome = match &details {
            InboundConnectorDetails::Invalid(invalid) => {
                Err(ActivationError::InvalidDefinition(invalid.error().clone()))
            }
            InboundConnectorDetails::Valid(valid) => self.activate_valid(key, entry, valid).await,
        };
        let elapsed = started.elapsed();

        let (previous_health, health, result) = {
            let mut state = entry.state.lock();
            let in_flight = state.in_flight.take();
            let mut activity_log = ActivityLog::new(self.config.activity_log_size);
            let (registration, result) = match outcome {
                Ok((executable, executable_id)) => {
                    let mut health = Health::up();
                    if let Some(in_flight) = in_flight {
                        for activity in in_flight.activity {
                            activity_log.push(activity);
                        }
                        health = in_flight.health.unwrap_or(health);
                    }
                    let registration = ExecutableRegistration {
                        details,
                        executable: Some(executable),
                        executable_id: Some(executable_id),
                        status: RegistrationStatus::Activated,
                        health,
                        activated_at: Some(Utc::now()),
                        revision,
                        activity_log,
                    };
                    (registration, Ok(executable_id))
                }
                Err(error) => {
                    activity_log.push(Activity::error("activation", error.to_string()));
                    let registration = ExecutableRegistration {
                        details,
                        executable: None,
                        executable_id: None,
                        status: error.status(),
                        health: Health::from_error(&error),
                        activated_at: None,
                        revision,
                        activity_log,
                    };
                    (registration, Err(error))
                }
            };
            let health = registration.health.clone();
            let previous = state.registration.replace(registration).map(|old| old.health);
            (previous, health, result)
        };

        let metrics = self.telemetry.metrics();
        let activated = match result {
            Ok(executable_id) => {
                metrics
                    .counter_with_labels(ACTIVATIONS_TOTAL, &[("type", connector_type.as_str())])
                    .inc();
                metrics.gauge(ACTIVE_EXECUTABLES).inc();
                metrics
                    .histogram(ACTIVATION_DURATION_SECONDS)
                    .observe(elapsed.as_secs_f64());
                tracing::info!(
                    deduplication_id = %key,
                    connector_type = %connector_type,
                    executable_id = %executable_id,
                    revision,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "activated inbound connector"
                );
                self.telemetry.event_bus().emit(InboundEvent::Activated {
                    deduplication_id: key.clone(),
                    connector_type,
                    executable_id,
                    duration: elapsed,
                });
                true
            }
            Err(error) => {
                metrics
                    .counter_with_labels(ACTIVATION_FAILURES_TOTAL, &[("kind", error.kind())])
                    .inc();
                tracing::warn!(
                    deduplication_id = %key,
                    connector_type = %connector_type,
                    kind = error.kind(),
                    error = %error,
                    "failed to activate inbound connector"
                );
                self.telemetry.event_bus().emit(InboundEvent::ActivationFailed {
                    deduplication_id: key.clone(),
                    connector_type,
                    kind: error.kind().to_owned(),
                    error: error.to_string(),
                });
                false
            }
        };

        if let Some(previous) = previous_health {
            self.health.transition(key, &previous, &health);
        }
        activated
    }

    async fn activate_valid(
        self: &Arc<Self>,
        key: &DeduplicationId,
        entry: &Arc<KeyEntry>,
        details: &ValidDetails,
    ) -> Result<(Arc<dyn InboundExecutable>, ExecutableId), ActivationError> {
        let executable = self
            .factory
            .get_instance(details.connector_type())
            .map_err(ActivationError::ConnectorNotRegistered)?;

        let executable_id = ExecutableId::v4();
        let handle = ExecutableHandle::new(Arc::downgrade(self), key.clone(), executable_id);
        let context = self
            .context_factory
            .create_context(details, handle)
            .map_err(ActivationError::ContextCreation)?;

        entry.state.lock().in_flight = Some(InFlight::new(executable_id));
        let result = AssertUnwindSafe(executable.activate(context))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(())) => Ok((executable, executable_id)),
            Ok(Err(e)) => Err(ActivationError::ActivationFailure(e)),
            Err(panic) => Err(ActivationError::Panicked {
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    /// Stop the live executable of `key`, if there is one.
    ///
    /// Caller holds the key's transition lock. Errors are logged only.
    async fn deactivate_entry(&self, key: &DeduplicationId, entry: &KeyEntry) {
        let taken = {
            let mut state = entry.state.lock();
            state.registration.as_mut().and_then(|r| {
                let executable = r.executable.take()?;
                if r.status == RegistrationStatus::Activated {
                    r.status = RegistrationStatus::Deactivating;
                }
                Some((executable, r.details.connector_type().clone()))
            })
        };
        let Some((executable, connector_type)) = taken else {
            return;
        };

        let result = AssertUnwindSafe(executable.deactivate())
            .catch_unwind()
            .await;
        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(ActivationError::DeactivationFailure(e)),
            Err(panic) => Some(ActivationError::DeactivationFailure(ExecutableError::new(
                panic_message(panic.as_ref()),
            ))),
        };
        if let Some(error) = error {
            tracing::error!(
                deduplication_id = %key,
                connector_type = %connector_type,
                error = %error,
                "failed to deactivate inbound connector"
            );
        } else {
            tracing::info!(
                deduplication_id = %key,
                connector_type = %connector_type,
                "deactivated inbound connector"
            );
        }

        let metrics = self.telemetry.metrics();
        metrics
            .counter_with_labels(DEACTIVATIONS_TOTAL, &[("type", connector_type.as_str())])
            .inc();
        metrics.gauge(ACTIVE_EXECUTABLES).dec();
        self.telemetry.event_bus().emit(InboundEvent::Deactivated {
            deduplication_id: key.clone(),
            connector_type,
        });
    }

    // -----------------------------------------------------------------------
    // Callbacks from executables
    // -----------------------------------------------------------------------

    pub(crate) fn log_activity(
        &self,
        key: &DeduplicationId,
        executable_id: ExecutableId,
        activity: Activity,
    ) {
        let Some(entry) = self.entries.get(key).map(|e| Arc::clone(e.value())) else {
            return;
        };
        let mut state = entry.state.lock();
        if let Some(in_flight) = state
            .in_flight
            .as_mut()
            .filter(|f| f.executable_id == executable_id)
        {
            in_flight.activity.push(activity);
            return;
        }
        if let Some(registration) = state
            .registration
            .as_mut()
            .filter(|r| r.executable_id == Some(executable_id))
        {
            registration.activity_log.push(activity);
        }
    }

    /// Queue a cancellation. Runs on its own task because the executable may
    /// call this from inside `activate`, while the key is still locked.
    pub(crate) fn request_cancellation(
        self: &Arc<Self>,
        key: DeduplicationId,
        executable_id: ExecutableId,
        error: ExecutableError,
        restart: Option<RestartPolicy>,
    ) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                deduplication_id = %key,
                "cancellation requested outside a tokio runtime, ignoring"
            );
            return;
        };
        let shared = Arc::clone(self);
        runtime.spawn(async move {
            shared
                .handle_cancellation(key, executable_id, error, restart)
                .await;
        });
    }

    async fn handle_cancellation(
        self: Arc<Self>,
        key: DeduplicationId,
        executable_id: ExecutableId,
        error: ExecutableError,
        restart: Option<RestartPolicy>,
    ) {
        let Some(entry) = self.entries.get(&key).map(|e| Arc::clone(e.value())) else {
            return;
        };
        let guard = Arc::clone(&entry.transition).lock_owned().await;
        if *guard {
            return;
        }

        let cancelled = {
            let mut state = entry.state.lock();
            match state.registration.as_mut() {
                Some(registration)
                    if registration.executable_id == Some(executable_id)
                        && registration.status == RegistrationStatus::Activated =>
                {
                    let health = Health::from_error(&error);
                    let previous = std::mem::replace(&mut registration.health, health.clone());
                    registration.status = RegistrationStatus::Cancelled;
                    registration
                        .activity_log
                        .push(Activity::error("cancellation", error.to_string()));
                    Some((
                        previous,
                        health,
                        registration.details.clone(),
                        registration.revision,
                    ))
                }
                _ => None,
            }
        };
        let Some((previous, health, details, revision)) = cancelled else {
            tracing::debug!(
                deduplication_id = %key,
                executable_id = %executable_id,
                "ignoring cancellation from a replaced executable"
            );
            return;
        };

        tracing::warn!(
            deduplication_id = %key,
            executable_id = %executable_id,
            error = %error,
            restart = restart.is_some(),
            "inbound connector cancelled"
        );
        self.telemetry.event_bus().emit(InboundEvent::Cancelled {
            deduplication_id: key.clone(),
            error: error.to_string(),
            restart: restart.is_some(),
        });
        self.health.transition(&key, &previous, &health);
        self.deactivate_entry(&key, &entry).await;
        drop(guard);

        if let Some(policy) = restart {
            self.restart(key, details, revision, policy).await;
        }
    }

    async fn restart(
        self: Arc<Self>,
        key: DeduplicationId,
        details: InboundConnectorDetails,
        revision: u64,
        policy: RestartPolicy,
    ) {
        for attempt in 1..=policy.max_retries.saturating_add(1) {
            tokio::time::sleep(policy.backoff).await;

            let (entry, _guard) = match self.entries.get(&key).map(|e| Arc::clone(e.value())) {
                Some(entry) => {
                    let guard = Arc::clone(&entry.transition).lock_owned().await;
                    if *guard {
                        return;
                    }
                    (entry, guard)
                }
                None => return,
            };

            let unchanged = {
                let state = entry.state.lock();
                state.registration.as_ref().is_some_and(|r| {
                    r.details == details && r.revision == revision && !r.status.is_settled()
                })
            };
            if !unchanged {
                tracing::debug!(
                    deduplication_id = %key,
                    "registration changed since cancellation, abandoning restart"
                );
                return;
            }

            tracing::info!(deduplication_id = %key, attempt, "restarting inbound connector");
            if self
                .activate_entry(&key, &entry, details.clone(), revision)
                .await
            {
                return;
            }
        }
        tracing::warn!(
            deduplication_id = %key,
            attempts = policy.max_retries.saturating_add(1),
            "giving up restarting inbound connector"
        );
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn query(&self, query: &ActiveExecutableQuery) -> Vec<RegistrationView> {
        let mut views: Vec<RegistrationView> = self
            .snapshot()
            .into_iter()
            .filter_map(|(_, entry)| {
                let state = entry.state.lock();
                state
                    .registration
                    .as_ref()
                    .filter(|r| query.matches(&r.details))
                    .map(ExecutableRegistration::view)
            })
            .collect();
        views.sort_by(|a, b| a.deduplication_id.cmp(&b.deduplication_id));
        views
    }

    fn status_report(&self) -> StatusReport {
        let mut report = StatusReport::new();
        for (_, entry) in self.snapshot() {
            let state = entry.state.lock();
            if let Some(registration) = state
                .registration
                .as_ref()
                .filter(|r| r.status == RegistrationStatus::Activated)
            {
                *report
                    .entry(registration.details.connector_type().clone())
                    .or_default() += 1;
            }
        }
        report
    }

    fn log_status_report(&self) {
        let report = self.status_report();
        if report.is_empty() {
            tracing::info!("no inbound connectors active");
            return;
        }
        for (connector_type, count) in &report {
            tracing::info!(connector_type = %connector_type, count, "active inbound connectors");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "executable panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use inbound_core::{CorrelationPoint, ElementId, ProcessElement, ProcessId, TenantId};
    use pretty_assertions::assert_eq;
    use tokio::task::JoinSet;

    use super::*;
    use crate::context::InboundContext;
    use crate::error::ContextError;
    use crate::executable::ConnectorRegistry;

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    /// Never reached: no connector type is registered.
    struct NoContext;

    impl ContextFactory for NoContext {
        fn create_context(
            &self,
            _details: &ValidDetails,
            _handle: ExecutableHandle,
        ) -> Result<InboundContext, ContextError> {
            Err(ContextError::Creation {
                message: "no contexts in this test".to_owned(),
            })
        }
    }

    fn registry() -> InboundExecutableRegistry {
        let config = RuntimeConfig::default();
        InboundExecutableRegistry::new(
            Arc::new(ConnectorRegistry::new()),
            Arc::new(NoContext),
            config.telemetry(),
            config,
        )
    }

    fn element(process: &str, key: &str) -> ConnectorElement {
        let properties: BTreeMap<String, String> = [
            ("inbound.type", "io.camunda:webhook:1"),
            ("deduplicationMode", "MANUAL"),
            ("deduplicationId", key),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        ConnectorElement::new(
            properties,
            CorrelationPoint::StartEvent,
            ProcessElement {
                process_id: ProcessId::new(process),
                version: 1,
                process_definition_key: 1,
                element_id: ElementId::new(key),
                tenant_id: TenantId::new("tenant-a"),
            },
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Scope locks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn scope_lock_is_released_after_each_event() {
        let registry = registry();

        registry
            .handle_event(DeploymentChangeEvent::new(
                "tenant-a",
                "orders",
                1,
                vec![element("orders", "k1")],
            ))
            .await;
        assert_eq!(registry.len(), 1);
        assert!(registry.shared.scope_locks.is_empty());

        registry
            .handle_event(DeploymentChangeEvent::removed("tenant-a", "orders", 2))
            .await;
        assert!(registry.is_empty());
        assert!(registry.shared.scope_locks.is_empty());
        assert!(registry.shared.entries.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scope_locks_are_released_after_concurrent_events() {
        let registry = registry();

        let mut set = JoinSet::new();
        for revision in 0..50_u64 {
            let registry = registry.clone();
            let process = if revision % 2 == 0 { "orders" } else { "refunds" };
            set.spawn(async move {
                registry
                    .handle_event(DeploymentChangeEvent::new(
                        "tenant-a",
                        process,
                        revision,
                        vec![element(process, &format!("k{revision}"))],
                    ))
                    .await;
            });
        }
        while let Some(joined) = set.join_next().await {
            joined.unwrap();
        }

        assert!(registry.shared.scope_locks.is_empty());
        assert_eq!(registry.len(), 2);
    }
}
