//! Delivery of inbound payloads to the workflow engine.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use inbound_core::{ConnectorElement, CorrelationPoint};
use inbound_telemetry::metrics::{
    ACTIVATION_CONDITION_NOT_MET_TOTAL, CORRELATION_FAILURES_TOTAL, CORRELATIONS_TOTAL,
};
use inbound_telemetry::{InboundEvent, TelemetryService};
use serde_json::{Map, Value};

use crate::engine::{
    CreateProcessInstance, EngineError, EngineErrorCode, PublishMessage, WorkflowEngineClient,
};
use crate::expression::{self, ExpressionError, ExpressionEvaluator};
use crate::result::{ActivationCheck, CorrelationFailure, CorrelationResult, CorrelationSuccess};

/// Time-to-live of published messages when neither the element nor the
/// engine configuration provides one.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_hours(1);

/// A payload produced by an executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationRequest {
    /// Payload, also the scope for every expression.
    pub variables: Value,
    /// Message id supplied by the source, used when the element has no
    /// message id expression.
    pub message_id: Option<String>,
}

impl CorrelationRequest {
    /// A request without a source message id.
    pub fn new(variables: Value) -> Self {
        Self {
            variables,
            message_id: None,
        }
    }

    /// Attach the source's message id.
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// Turns inbound payloads into workflow-engine commands.
///
/// `correlate` and `correlate_group` are total: engine errors, expression
/// errors and panics inside the engine client all come back as
/// [`CorrelationFailure`]. There is no retry here; whether redelivery is safe
/// is the executable's call.
pub struct CorrelationEngine {
    engine: Arc<dyn WorkflowEngineClient>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    telemetry: Arc<dyn TelemetryService>,
    default_message_ttl: Duration,
}

impl CorrelationEngine {
    /// Create an engine with [`DEFAULT_MESSAGE_TTL`].
    pub fn new(
        engine: Arc<dyn WorkflowEngineClient>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        telemetry: Arc<dyn TelemetryService>,
    ) -> Self {
        Self {
            engine,
            evaluator,
            telemetry,
            default_message_ttl: DEFAULT_MESSAGE_TTL,
        }
    }

    /// Override the fallback message time-to-live.
    pub fn with_default_message_ttl(mut self, ttl: Duration) -> Self {
        self.default_message_ttl = ttl;
        self
    }

    /// Evaluator used for conditions and mappings.
    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.evaluator.as_ref()
    }

    /// Correlate a payload to a single element.
    pub async fn correlate(
        &self,
        element: &ConnectorElement,
        request: CorrelationRequest,
    ) -> CorrelationResult {
        let result = match self.condition_holds(element, &request.variables) {
            Ok(true) => self.dispatch(element, request).await,
            Ok(false) => CorrelationResult::Failure(CorrelationFailure::ActivationConditionNotMet {
                consume_unmatched_events: element.consume_unmatched_events(),
            }),
            Err(e) => CorrelationResult::Failure(condition_error(&e)),
        };
        self.record(element, &result);
        result
    }

    /// Correlate a payload to whichever element of a listener group accepts it.
    pub async fn correlate_group(
        &self,
        elements: &[ConnectorElement],
        request: CorrelationRequest,
    ) -> CorrelationResult {
        let Some(first) = elements.first() else {
            return CorrelationResult::Failure(CorrelationFailure::InvalidInput {
                message: "No elements to correlate to".to_owned(),
            });
        };

        let result = match self.matching_element(elements, &request.variables) {
            Ok(Matched::One(element)) => {
                let result = self.dispatch(element, request).await;
                self.record(element, &result);
                return result;
            }
            Ok(Matched::None {
                consume_unmatched_events,
            }) => CorrelationResult::Failure(CorrelationFailure::ActivationConditionNotMet {
                consume_unmatched_events,
            }),
            Ok(Matched::Many) => CorrelationResult::Failure(CorrelationFailure::InvalidInput {
                message: "Multiple connectors are activated for the same input".to_owned(),
            }),
            Err(e) => CorrelationResult::Failure(condition_error(&e)),
        };
        self.record(first, &result);
        result
    }

    /// Determine which element of a group a payload would activate.
    pub fn can_activate(
        &self,
        elements: &[ConnectorElement],
        variables: &Value,
    ) -> Result<ActivationCheck, ExpressionError> {
        Ok(match self.matching_element(elements, variables)? {
            Matched::One(element) => ActivationCheck::Activated(element.element().clone()),
            Matched::None {
                consume_unmatched_events,
            } => ActivationCheck::NoMatchingElement {
                consume_unmatched_events,
            },
            Matched::Many => ActivationCheck::TooManyMatchingElements,
        })
    }

    fn condition_holds(
        &self,
        element: &ConnectorElement,
        variables: &Value,
    ) -> Result<bool, ExpressionError> {
        match element.activation_condition() {
            None => Ok(true),
            Some(condition) => {
                expression::evaluate_condition(self.evaluator.as_ref(), condition, variables)
            }
        }
    }

    fn matching_element<'a>(
        &self,
        elements: &'a [ConnectorElement],
        variables: &Value,
    ) -> Result<Matched<'a>, ExpressionError> {
        let mut matched = Vec::new();
        for element in elements {
            if self.condition_holds(element, variables)? {
                matched.push(element);
            }
        }
        Ok(match matched.as_slice() {
            [] => Matched::None {
                consume_unmatched_events: elements.iter().any(ConnectorElement::consume_unmatched_events),
            },
            [one] => Matched::One(one),
            _ => Matched::Many,
        })
    }

    async fn dispatch(
        &self,
        element: &ConnectorElement,
        request: CorrelationRequest,
    ) -> CorrelationResult {
        let variables = match self.output_variables(element, &request.variables) {
            Ok(variables) => variables,
            Err(e) => {
                return CorrelationResult::Failure(CorrelationFailure::InvalidInput {
                    message: format!("Failed to map the result: {e}"),
                });
            }
        };

        match element.correlation_point() {
            CorrelationPoint::StartEvent => self.create_instance(element, variables).await,
            point => {
                let Some(message) = point.message() else {
                    return CorrelationResult::Failure(CorrelationFailure::Other {
                        message: format!("Unsupported correlation point: {}", point.kind()),
                    });
                };
                let message_name = message.message_name.clone();
                self.publish(element, message_name, request, variables).await
            }
        }
    }

    async fn create_instance(
        &self,
        element: &ConnectorElement,
        variables: Value,
    ) -> CorrelationResult {
        let process = element.element();
        let command = CreateProcessInstance {
            process_definition_key: process.process_definition_key,
            process_id: process.process_id.clone(),
            version: process.version,
            tenant_id: process.tenant_id.clone(),
            variables,
        };

        match guard(async { self.engine.create_process_instance(command).await }).await {
            Ok(instance) => CorrelationResult::Success(CorrelationSuccess::ProcessInstanceCreated {
                element: process.clone(),
                instance,
            }),
            Err(failure) => CorrelationResult::Failure(failure),
        }
    }

    async fn publish(
        &self,
        element: &ConnectorElement,
        message_name: String,
        request: CorrelationRequest,
        variables: Value,
    ) -> CorrelationResult {
        let key_expression = element.correlation_key_expression();
        let correlation_key = key_expression.and_then(|expr| {
            expression::evaluate_string(self.evaluator.as_ref(), expr, &request.variables)
                .ok()
                .flatten()
        });

        let correlation_key = match correlation_key {
            Some(key) => key,
            None if element.correlation_point().requires_correlation_key() => {
                return CorrelationResult::Failure(CorrelationFailure::InvalidInput {
                    message: format!(
                        "Wasn't able to obtain correlation key for expression {}",
                        key_expression.unwrap_or_default()
                    ),
                });
            }
            None => String::new(),
        };

        let message_id = match element.message_id_expression() {
            Some(expr) => {
                match expression::evaluate_string(self.evaluator.as_ref(), expr, &request.variables)
                {
                    Ok(id) => id,
                    Err(e) => {
                        return CorrelationResult::Failure(CorrelationFailure::InvalidInput {
                            message: format!("Message expression could not be evaluated: {e}"),
                        });
                    }
                }
            }
            None => request.message_id,
        };

        let process = element.element();
        let command = PublishMessage {
            message_name,
            correlation_key,
            message_id,
            time_to_live: element.message_ttl().unwrap_or(self.default_message_ttl),
            tenant_id: process.tenant_id.clone(),
            variables,
        };

        match guard(async { self.engine.publish_message(command).await }).await {
            Ok(message) => CorrelationResult::Success(CorrelationSuccess::MessagePublished {
                element: process.clone(),
                message,
            }),
            Err(CorrelationFailure::EngineStatus {
                code: EngineErrorCode::AlreadyExists,
                ..
            }) => CorrelationResult::Success(CorrelationSuccess::MessageAlreadyCorrelated {
                element: process.clone(),
            }),
            Err(failure) => CorrelationResult::Failure(failure),
        }
    }

    fn output_variables(
        &self,
        element: &ConnectorElement,
        payload: &Value,
    ) -> Result<Value, ExpressionError> {
        let mut variables = Map::new();
        if let Some(name) = element.result_variable() {
            variables.insert(name.to_owned(), payload.clone());
        }
        if let Some(expr) = element.result_expression() {
            match self.evaluator.evaluate(expr, payload)? {
                Value::Object(mapped) => variables.extend(mapped),
                Value::Null => {}
                other => {
                    return Err(ExpressionError::TypeMismatch {
                        expression: expr.to_owned(),
                        expected: "object",
                        actual: other.to_string(),
                    });
                }
            }
        }
        Ok(Value::Object(variables))
    }

    fn record(&self, element: &ConnectorElement, result: &CorrelationResult) {
        let metrics = self.telemetry.metrics();
        let connector_type = element.connector_type();
        match result {
            CorrelationResult::Success(success) => {
                tracing::debug!(
                    connector_type = %connector_type,
                    element_id = %success.element().element_id,
                    outcome = success.kind(),
                    "correlated inbound payload"
                );
                metrics
                    .counter_with_labels(CORRELATIONS_TOTAL, &[("type", connector_type.as_str())])
                    .inc();
                self.telemetry.event_bus().emit(InboundEvent::Correlated {
                    connector_type: connector_type.clone(),
                    element_id: success.element().element_id.clone(),
                    outcome: success.kind().to_owned(),
                });
            }
            CorrelationResult::Failure(CorrelationFailure::ActivationConditionNotMet { .. }) => {
                tracing::debug!(
                    connector_type = %connector_type,
                    "activation condition not met, payload not correlated"
                );
                metrics
                    .counter_with_labels(
                        ACTIVATION_CONDITION_NOT_MET_TOTAL,
                        &[("type", connector_type.as_str())],
                    )
                    .inc();
            }
            CorrelationResult::Failure(failure) => {
                tracing::warn!(
                    connector_type = %connector_type,
                    reason = failure.reason(),
                    error = %failure.message(),
                    "failed to correlate inbound payload"
                );
                metrics
                    .counter_with_labels(
                        CORRELATION_FAILURES_TOTAL,
                        &[("type", connector_type.as_str()), ("reason", failure.reason())],
                    )
                    .inc();
                self.telemetry.event_bus().emit(InboundEvent::CorrelationFailed {
                    connector_type: connector_type.clone(),
                    reason: failure.reason().to_owned(),
                    message: failure.message(),
                });
            }
        }
    }
}

impl std::fmt::Debug for CorrelationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("default_message_ttl", &self.default_message_ttl)
            .finish()
    }
}

enum Matched<'a> {
    One(&'a ConnectorElement),
    None { consume_unmatched_events: bool },
    Many,
}

fn condition_error(error: &ExpressionError) -> CorrelationFailure {
    CorrelationFailure::InvalidInput {
        message: format!("Failed to evaluate activation condition: {error}"),
    }
}

/// Await an engine call, mapping errors and panics to failures.
async fn guard<T>(
    call: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, CorrelationFailure> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CorrelationFailure::EngineStatus {
            code: e.code,
            message: e.message,
        }),
        Err(_) => Err(CorrelationFailure::Other {
            message: "workflow engine client panicked".to_owned(),
        }),
    }
}
