//! Workflow-engine operations used to deliver inbound payloads.
//!
//! The engine itself is an external collaborator; this module only fixes
//! the command shapes and the error contract. Every call is treated as a
//! fallible remote call.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use inbound_core::{ProcessId, TenantId};
use serde::{Deserialize, Serialize};

/// Start a new instance of a process definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProcessInstance {
    /// Engine key of the definition to start.
    pub process_definition_key: i64,
    /// BPMN process id.
    pub process_id: ProcessId,
    /// Definition version.
    pub version: i32,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Initial process variables (a JSON object).
    pub variables: serde_json::Value,
}

/// Publish a message to waiting subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishMessage {
    /// Message name from the process model.
    pub message_name: String,
    /// Correlation key; empty for message start events without one.
    pub correlation_key: String,
    /// Id used by the engine to reject duplicate publications.
    pub message_id: Option<String>,
    /// How long the engine buffers the message.
    #[serde(with = "humantime_serde")]
    pub time_to_live: Duration,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Message variables (a JSON object).
    pub variables: serde_json::Value,
}

/// Acknowledgment of [`CreateProcessInstance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstanceCreated {
    /// Key of the new instance.
    pub process_instance_key: i64,
    /// Definition the instance was created from.
    pub process_definition_key: i64,
    /// Owning tenant.
    pub tenant_id: TenantId,
}

/// Acknowledgment of [`PublishMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePublished {
    /// Key of the published message.
    pub message_key: i64,
    /// Owning tenant.
    pub tenant_id: TenantId,
}

/// Status code returned by a rejected engine command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineErrorCode {
    /// A message with the same id is already buffered.
    AlreadyExists,
    /// Referenced definition or subscription does not exist.
    NotFound,
    /// The command was malformed.
    InvalidArgument,
    /// The engine cannot take requests right now.
    Unavailable,
    /// The engine applies backpressure.
    ResourceExhausted,
    /// The request timed out.
    DeadlineExceeded,
    /// The engine failed internally.
    Internal,
    /// Anything not covered above.
    Unknown,
}

impl EngineErrorCode {
    /// Whether resending the same command later may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::ResourceExhausted | Self::DeadlineExceeded
        )
    }

    /// Wire name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unavailable => "UNAVAILABLE",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected engine command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct EngineError {
    /// Status code.
    pub code: EngineErrorCode,
    /// Engine-provided description.
    pub message: String,
}

impl EngineError {
    /// Create an error with the given code.
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Client for the workflow-engine commands inbound correlation needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowEngineClient: Send + Sync {
    /// Start a process instance.
    async fn create_process_instance(
        &self,
        command: CreateProcessInstance,
    ) -> Result<ProcessInstanceCreated, EngineError>;

    /// Publish a message.
    async fn publish_message(&self, command: PublishMessage)
    -> Result<MessagePublished, EngineError>;
}
