#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Inbound Correlation
//!
//! Matches inbound payloads to their correlation point and delivers them to
//! the workflow engine.
//!
//! This crate provides:
//! - [`CorrelationEngine`] -- activation-condition filtering and dispatch
//! - [`CorrelationResult`] -- structured success / failure outcome
//! - [`WorkflowEngineClient`] -- seam to the external engine
//! - [`ExpressionEvaluator`] -- seam to the expression language, with
//!   [`SimpleExpressionEvaluator`] as the built-in subset

pub mod engine;
pub mod expression;
pub mod handler;
pub mod result;

pub use engine::{
    CreateProcessInstance, EngineError, EngineErrorCode, MessagePublished, ProcessInstanceCreated,
    PublishMessage, WorkflowEngineClient,
};
pub use expression::{ExpressionError, ExpressionEvaluator, SimpleExpressionEvaluator};
pub use handler::{CorrelationEngine, CorrelationRequest, DEFAULT_MESSAGE_TTL};
pub use result::{
    ActivationCheck, CorrelationFailure, CorrelationResult, CorrelationSuccess,
    FailureHandlingStrategy,
};
