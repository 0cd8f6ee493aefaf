//! Common test utilities for inbound-runtime integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use inbound_core::{
    ConnectorElement, CorrelationPoint, ElementId, MessageCorrelation, ProcessElement, ProcessId,
    TenantId,
};
use inbound_correlation::{
    CreateProcessInstance, EngineError, MessagePublished,
    ProcessInstanceCreated, PublishMessage, SimpleExpressionEvaluator, WorkflowEngineClient,
};
use inbound_runtime::{
    ActiveExecutableQuery, ConnectorRegistry, DeploymentChangeEvent, ExecutableError, Health,
    InboundContext, InboundExecutable, InboundExecutableRegistry, RegistrationView, RuntimeConfig,
};
use inbound_telemetry::TelemetryService;
use parking_lot::Mutex;

pub const TENANT: &str = "tenant-a";
pub const WEBHOOK: &str = "io.camunda:webhook:1";

// ---------------------------------------------------------------------------
// Executables
// ---------------------------------------------------------------------------

/// What a [`TestExecutable`] does when activated.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Panic,
    Delay(Duration),
    /// First activation of the recorder succeeds, later ones fail.
    SucceedFirst(&'static str),
    /// First activation of the recorder fails, later ones succeed.
    FailFirst(&'static str),
    /// Reports DOWN from inside `activate`, then succeeds.
    ReportDown(&'static str),
    /// Activates fine, `deactivate` fails.
    DeactivateFails,
    /// Activates fine, `deactivate` takes this long.
    SlowDeactivate(Duration),
}

/// Counters shared by every instance created for one connector type.
#[derive(Default)]
pub struct Recorder {
    pub activations: AtomicUsize,
    pub deactivations: AtomicUsize,
    pub contexts: Mutex<Vec<InboundContext>>,
}

impl Recorder {
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    /// Context of the most recent activation.
    pub fn last_context(&self) -> InboundContext {
        self.contexts
            .lock()
            .last()
            .cloned()
            .expect("no activation recorded")
    }

    /// Context of the `n`th activation (0-based).
    pub fn context(&self, n: usize) -> InboundContext {
        self.contexts.lock()[n].clone()
    }
}

struct TestExecutable {
    recorder: Arc<Recorder>,
    behavior: Behavior,
}

#[async_trait]
impl InboundExecutable for TestExecutable {
    async fn activate(&self, context: InboundContext) -> Result<(), ExecutableError> {
        let n = self.recorder.activations.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.contexts.lock().push(context.clone());
        match self.behavior {
            Behavior::Succeed | Behavior::DeactivateFails | Behavior::SlowDeactivate(_) => Ok(()),
            Behavior::Fail(message) => Err(ExecutableError::new(message)),
            Behavior::Panic => panic!("activation exploded"),
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::SucceedFirst(message) => {
                if n == 1 {
                    Ok(())
                } else {
                    Err(ExecutableError::new(message))
                }
            }
            Behavior::FailFirst(message) => {
                if n == 1 {
                    Err(ExecutableError::new(message))
                } else {
                    Ok(())
                }
            }
            Behavior::ReportDown(message) => {
                context.report_health(Health::down(message));
                Ok(())
            }
        }
    }

    async fn deactivate(&self) -> Result<(), ExecutableError> {
        self.recorder.deactivations.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::DeactivateFails => Err(ExecutableError::new("socket already closed")),
            Behavior::SlowDeactivate(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow engine
// ---------------------------------------------------------------------------

/// Engine client that accepts every command and records it.
#[derive(Default)]
pub struct RecordingEngine {
    pub created: Mutex<Vec<CreateProcessInstance>>,
    pub published: Mutex<Vec<PublishMessage>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> usize {
        self.created.lock().len() + self.published.lock().len()
    }
}

#[async_trait]
impl WorkflowEngineClient for RecordingEngine {
    async fn create_process_instance(
        &self,
        command: CreateProcessInstance,
    ) -> Result<ProcessInstanceCreated, EngineError> {
        let created = ProcessInstanceCreated {
            process_instance_key: 100,
            process_definition_key: command.process_definition_key,
            tenant_id: command.tenant_id.clone(),
        };
        self.created.lock().push(command);
        Ok(created)
    }

    async fn publish_message(
        &self,
        command: PublishMessage,
    ) -> Result<MessagePublished, EngineError> {
        let published = MessagePublished {
            message_key: 200,
            tenant_id: command.tenant_id.clone(),
        };
        self.published.lock().push(command);
        Ok(published)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub registry: InboundExecutableRegistry,
    pub connectors: Arc<ConnectorRegistry>,
    pub telemetry: Arc<dyn TelemetryService>,
    pub engine: Arc<RecordingEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let connectors = Arc::new(ConnectorRegistry::new());
        let telemetry = config.telemetry();
        let engine = Arc::new(RecordingEngine::default());
        let correlation = Arc::new(config.correlation_engine(
            Arc::clone(&engine) as Arc<dyn WorkflowEngineClient>,
            Arc::new(SimpleExpressionEvaluator),
            Arc::clone(&telemetry),
        ));
        let registry = InboundExecutableRegistry::with_correlation(
            Arc::clone(&connectors) as _,
            correlation,
            Arc::clone(&telemetry),
            config,
        );
        Self {
            registry,
            connectors,
            telemetry,
            engine,
        }
    }

    /// Register `connector_type` with a fresh recorder.
    pub fn register(&self, connector_type: &str, behavior: Behavior) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        let shared = Arc::clone(&recorder);
        self.connectors.register(connector_type, move || {
            Arc::new(TestExecutable {
                recorder: Arc::clone(&shared),
                behavior,
            }) as Arc<dyn InboundExecutable>
        });
        recorder
    }

    /// The registration of `key`; panics when there is none.
    pub fn view(&self, key: &str) -> RegistrationView {
        self.try_view(key)
            .unwrap_or_else(|| panic!("no registration for {key}"))
    }

    pub fn try_view(&self, key: &str) -> Option<RegistrationView> {
        self.registry
            .query(&ActiveExecutableQuery::new().with_deduplication_id(key))
            .into_iter()
            .next()
    }
}

// ---------------------------------------------------------------------------
// Elements and events
// ---------------------------------------------------------------------------

/// Element with a manual deduplication id.
pub fn element(
    process: &str,
    element_id: &str,
    key: &str,
    connector_type: &str,
    extra: &[(&str, &str)],
) -> ConnectorElement {
    element_for(TENANT, process, element_id, key, connector_type, extra)
}

pub fn element_for(
    tenant: &str,
    process: &str,
    element_id: &str,
    key: &str,
    connector_type: &str,
    extra: &[(&str, &str)],
) -> ConnectorElement {
    element_at(CorrelationPoint::StartEvent, tenant, process, element_id, key, connector_type, extra)
}

/// Element on a message start event subscribed to `message_name`.
pub fn message_start_element(
    process: &str,
    element_id: &str,
    key: &str,
    message_name: &str,
    extra: &[(&str, &str)],
) -> ConnectorElement {
    element_at(
        CorrelationPoint::MessageStartEvent(MessageCorrelation::new(message_name)),
        TENANT,
        process,
        element_id,
        key,
        WEBHOOK,
        extra,
    )
}

fn element_at(
    point: CorrelationPoint,
    tenant: &str,
    process: &str,
    element_id: &str,
    key: &str,
    connector_type: &str,
    extra: &[(&str, &str)],
) -> ConnectorElement {
    let mut properties: BTreeMap<String, String> = [
        ("inbound.type", connector_type),
        ("deduplicationMode", "MANUAL"),
        ("deduplicationId", key),
    ]
    .into_iter()
    .chain(extra.iter().copied())
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    properties.retain(|_, v| !v.is_empty());

    ConnectorElement::new(
        properties,
        point,
        ProcessElement {
            process_id: ProcessId::new(process),
            version: 1,
            process_definition_key: 1,
            element_id: ElementId::new(element_id),
            tenant_id: TenantId::new(tenant),
        },
    )
    .expect("valid element")
}

pub fn event(process: &str, revision: u64, elements: Vec<ConnectorElement>) -> DeploymentChangeEvent {
    DeploymentChangeEvent::new(TENANT, process, revision, elements)
}

/// Poll `condition` until it holds, failing after five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
