//! Where an inbound event is delivered inside the workflow engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::ElementId;

/// Correlation target of an inbound element.
///
/// Produced once per element by the process-model parser. The variant decides
/// which engine operation a matched payload turns into: starting a new
/// process instance or publishing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrelationPoint {
    /// Plain (none) start event: every payload creates a process instance.
    StartEvent,
    /// Message start event: payloads are published as messages that may start
    /// an instance. A correlation key is optional.
    MessageStartEvent(MessageCorrelation),
    /// Intermediate message catch event or receive task of a running instance.
    /// A correlation key is mandatory.
    Message(MessageCorrelation),
    /// Message boundary event attached to an activity of a running instance.
    /// A correlation key is mandatory.
    BoundaryEvent {
        /// Activity the boundary event is attached to.
        attached_to: ActivityRef,
        /// Message subscription of the boundary event.
        message: MessageCorrelation,
    },
}

impl CorrelationPoint {
    /// Message subscription of this point, if it correlates through messages.
    pub fn message(&self) -> Option<&MessageCorrelation> {
        match self {
            Self::StartEvent => None,
            Self::MessageStartEvent(message) | Self::Message(message) => Some(message),
            Self::BoundaryEvent { message, .. } => Some(message),
        }
    }

    /// Name of the message this point subscribes to.
    pub fn message_name(&self) -> Option<&str> {
        self.message().map(|m| m.message_name.as_str())
    }

    /// Returns `true` for message start events.
    pub fn is_message_start(&self) -> bool {
        matches!(self, Self::MessageStartEvent(_))
    }

    /// Returns `true` if a correlation key must be resolved before publishing.
    pub fn requires_correlation_key(&self) -> bool {
        matches!(self, Self::Message(_) | Self::BoundaryEvent { .. })
    }

    /// Short name of the variant, used in logs and views.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartEvent => "start_event",
            Self::MessageStartEvent(_) => "message_start_event",
            Self::Message(_) => "message",
            Self::BoundaryEvent { .. } => "boundary_event",
        }
    }
}

/// Message subscription details shared by the message-based points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCorrelation {
    /// Name of the message in the process model.
    pub message_name: String,
    /// Expression extracting the correlation key from a payload.
    #[serde(default)]
    pub correlation_key_expression: Option<String>,
    /// Expression extracting the message id from a payload.
    #[serde(default)]
    pub message_id_expression: Option<String>,
    /// Buffer time of published messages.
    #[serde(default, with = "humantime_serde")]
    pub time_to_live: Option<Duration>,
}

impl MessageCorrelation {
    /// A subscription with only a message name.
    pub fn new(message_name: impl Into<String>) -> Self {
        Self {
            message_name: message_name.into(),
            correlation_key_expression: None,
            message_id_expression: None,
            time_to_live: None,
        }
    }

    /// Set the correlation key expression.
    pub fn with_correlation_key(mut self, expression: impl Into<String>) -> Self {
        self.correlation_key_expression = Some(expression.into());
        self
    }

    /// Set the message id expression.
    pub fn with_message_id(mut self, expression: impl Into<String>) -> Self {
        self.message_id_expression = Some(expression.into());
        self
    }

    /// Set the message time-to-live.
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

/// Activity a boundary event is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRef {
    /// Element id of the activity.
    pub element_id: ElementId,
    /// Display name of the activity.
    #[serde(default)]
    pub name: Option<String>,
}
