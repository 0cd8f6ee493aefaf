#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Inbound Runtime
//!
//! Lifecycle management for inbound connector executables.
//!
//! This crate provides:
//! - [`InboundExecutableRegistry`] -- reacts to deployment changes by
//!   activating, reactivating and deactivating listeners, and serves queries
//! - [`group`] -- validates that elements sharing a deduplication id form
//!   one listener
//! - [`HealthMonitor`] -- UP/DOWN state per listener
//! - [`InboundExecutable`], [`ExecutableFactory`], [`ContextFactory`] -- the
//!   contracts connector implementations plug into
//! - [`RuntimeConfig`] -- TOML-loadable settings
//!
//! Activation failures never escape the registry: they become DOWN health
//! on the affected registration, and sibling listeners are unaffected.

pub mod activity;
pub mod config;
pub mod context;
pub mod details;
pub mod error;
pub mod event;
pub mod executable;
pub mod health;
pub mod query;
pub mod registration;
pub mod registry;

pub use activity::{Activity, ActivityLog, Severity};
pub use config::RuntimeConfig;
pub use context::{
    ConnectorDefinition, ConnectorProperties, ContextFactory, DefaultContextFactory,
    ExecutableHandle, InboundContext, REDACTED, RestartPolicy,
};
pub use details::{InboundConnectorDetails, InvalidDetails, ValidDetails, group};
pub use error::{
    ActivationError, ConfigError, ContextError, DefinitionError, ExecutableError, FactoryError,
};
pub use event::{DeploymentChangeEvent, ProcessScope};
pub use executable::{ConnectorRegistry, ExecutableFactory, InboundExecutable};
pub use health::{Health, HealthError, HealthMonitor, HealthStatus};
pub use query::{ActiveExecutableQuery, RegistrationView};
pub use registration::RegistrationStatus;
pub use registry::{InboundExecutableRegistry, StatusReport};
