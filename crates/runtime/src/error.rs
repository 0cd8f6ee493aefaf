//! Runtime error types.
//!
//! None of these escape [`handle_event`](crate::InboundExecutableRegistry::handle_event):
//! activation-side errors are converted into DOWN health on the
//! registration, deactivation errors are logged.

use inbound_core::{ConnectorType, TenantId};

use crate::registration::RegistrationStatus;

/// Elements sharing a deduplication id do not form one consistent listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// More than one connector type in the group.
    #[error("All elements in a group must have the same type")]
    TypeMismatch {
        /// Distinct types, sorted.
        types: Vec<ConnectorType>,
    },

    /// More than one tenant in the group.
    #[error("All elements in a group must have the same tenant ID")]
    TenantMismatch {
        /// Distinct tenants, sorted.
        tenants: Vec<TenantId>,
    },

    /// Connector properties differ between elements.
    #[error(
        "All elements in a group must have the same properties (excluding runtime-level properties). Diverging properties: {}",
        .properties.join(", ")
    )]
    PropertyMismatch {
        /// Names of the diverging properties, sorted.
        properties: Vec<String>,
    },
}

/// The executable factory cannot produce an instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    /// No constructor is registered for the type.
    #[error("Connector {connector_type} not registered")]
    NotRegistered {
        /// The type that was looked up.
        connector_type: ConnectorType,
    },

    /// The constructor failed.
    #[error("Failed to create connector {connector_type}: {message}")]
    Creation {
        /// The type that was looked up.
        connector_type: ConnectorType,
        /// Description of the failure.
        message: String,
    },
}

/// Error returned by an executable's `activate` or `deactivate`.
///
/// `Display` is the message verbatim, so whatever an executable reports is
/// exactly what ends up in the registration's health.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ExecutableError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutableError {
    /// An error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// An error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Building an [`InboundContext`](crate::InboundContext) failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Properties could not be bound to the requested configuration type.
    #[error("Failed to bind connector properties: {message}")]
    Binding {
        /// Description of the failure.
        message: String,
    },

    /// The context factory could not assemble a context.
    #[error("Failed to create inbound context: {message}")]
    Creation {
        /// Description of the failure.
        message: String,
    },
}

/// Why an activation attempt left a registration without a live executable.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    /// The element group is inconsistent; no factory call was made.
    #[error("Invalid connector definition: {0}")]
    InvalidDefinition(DefinitionError),

    /// The factory does not know the connector type.
    #[error(transparent)]
    ConnectorNotRegistered(FactoryError),

    /// The context factory failed.
    #[error(transparent)]
    ContextCreation(ContextError),

    /// `activate` returned an error.
    #[error(transparent)]
    ActivationFailure(ExecutableError),

    /// `activate` panicked.
    #[error("Activation panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// `deactivate` of the previous executable failed. Logged only.
    #[error("Failed to deactivate connector: {0}")]
    DeactivationFailure(ExecutableError),
}

impl ActivationError {
    /// Short name of the failure kind, for logs, events and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDefinition(_) => "invalid_definition",
            Self::ConnectorNotRegistered(_) => "connector_not_registered",
            Self::ContextCreation(_) => "context_creation",
            Self::ActivationFailure(_) => "activation_failure",
            Self::Panicked { .. } => "activation_panicked",
            Self::DeactivationFailure(_) => "deactivation_failure",
        }
    }

    /// Registration status this error leaves behind.
    pub fn status(&self) -> RegistrationStatus {
        match self {
            Self::InvalidDefinition(_) => RegistrationStatus::InvalidDefinition,
            Self::ConnectorNotRegistered(FactoryError::NotRegistered { .. }) => {
                RegistrationStatus::ConnectorNotRegistered
            }
            Self::ConnectorNotRegistered(FactoryError::Creation { .. })
            | Self::ContextCreation(_)
            | Self::ActivationFailure(_)
            | Self::Panicked { .. }
            | Self::DeactivationFailure(_) => RegistrationStatus::FailedToActivate,
        }
    }
}

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document is malformed or has wrong field types.
    #[error("invalid runtime configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
