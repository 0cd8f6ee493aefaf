#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Inbound Core
//!
//! Shared vocabulary of the inbound connector runtime.
//!
//! ## Key Components
//!
//! - **Identifiers**: TenantId, ProcessId, ElementId, ConnectorType, DeduplicationId, ExecutableId
//! - **Elements**: [`ProcessElement`] and [`ConnectorElement`], including deduplication-id derivation
//! - **Correlation points**: [`CorrelationPoint`], the closed set of delivery targets
//! - **Keywords**: property names the runtime consumes itself

pub mod correlation_point;
pub mod element;
pub mod error;
pub mod id;
pub mod keywords;

pub use correlation_point::{ActivityRef, CorrelationPoint, MessageCorrelation};
pub use element::{ConnectorElement, DeduplicationMode, ProcessElement};
pub use error::ElementError;
pub use id::{ConnectorType, DeduplicationId, ElementId, ExecutableId, ProcessId, TenantId};
