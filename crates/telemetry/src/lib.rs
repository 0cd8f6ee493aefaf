#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Inbound Telemetry
//!
//! Event bus and metrics for the inbound connector runtime.
//!
//! This crate provides:
//! - [`EventBus`] -- broadcast-based event distribution
//! - [`InboundEvent`] -- activation, health and correlation events
//! - [`MetricsRegistry`] -- in-memory counters, gauges and histograms
//! - [`TelemetryService`] trait -- pluggable telemetry backend
//! - [`InMemoryTelemetry`] -- the default backend
//!
//! Events are **projections**, not the source of truth. The executable
//! registry is the single source of truth for listener state.

pub mod event;
pub mod metrics;
pub mod service;

pub use event::{EventBus, EventSubscriber, InboundEvent};
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry};
pub use service::{InMemoryTelemetry, TelemetryService};
