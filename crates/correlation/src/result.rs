//! Outcome of a correlation attempt.

use inbound_core::ProcessElement;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineErrorCode, MessagePublished, ProcessInstanceCreated};

/// Reason code of [`CorrelationFailure::ActivationConditionNotMet`].
pub const ACTIVATION_CONDITION_NOT_MET: &str = "ACTIVATION_CONDITION_NOT_MET";
/// Reason code of [`CorrelationFailure::InvalidInput`].
pub const INVALID_INPUT: &str = "INVALID_INPUT";
/// Reason code of [`CorrelationFailure::EngineStatus`].
pub const ENGINE_STATUS: &str = "ENGINE_STATUS";
/// Reason code of [`CorrelationFailure::Other`].
pub const OTHER: &str = "OTHER";

/// Result of handing one payload to the workflow engine.
///
/// Returned synchronously to the calling executable and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationResult {
    /// The engine accepted the payload.
    Success(CorrelationSuccess),
    /// The payload was not delivered.
    Failure(CorrelationFailure),
}

impl CorrelationResult {
    /// Returns `true` for [`CorrelationResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&CorrelationFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// What the engine did with a delivered payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationSuccess {
    /// A start event created a new instance.
    ProcessInstanceCreated {
        /// Element that matched.
        element: ProcessElement,
        /// Engine acknowledgment.
        instance: ProcessInstanceCreated,
    },
    /// A message was published.
    MessagePublished {
        /// Element that matched.
        element: ProcessElement,
        /// Engine acknowledgment.
        message: MessagePublished,
    },
    /// A message with the same id was already published; nothing new happened.
    MessageAlreadyCorrelated {
        /// Element that matched.
        element: ProcessElement,
    },
}

impl CorrelationSuccess {
    /// Element the payload was delivered to.
    pub fn element(&self) -> &ProcessElement {
        match self {
            Self::ProcessInstanceCreated { element, .. }
            | Self::MessagePublished { element, .. }
            | Self::MessageAlreadyCorrelated { element } => element,
        }
    }

    /// Short name of the outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessInstanceCreated { .. } => "process_instance_created",
            Self::MessagePublished { .. } => "message_published",
            Self::MessageAlreadyCorrelated { .. } => "message_already_correlated",
        }
    }
}

/// Why a payload was not delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationFailure {
    /// No element's activation condition matched. An intentional filter,
    /// not an error.
    ActivationConditionNotMet {
        /// Whether the source should acknowledge and drop the payload.
        consume_unmatched_events: bool,
    },
    /// The payload or configuration could not be turned into a command.
    InvalidInput {
        /// Description of the problem.
        message: String,
    },
    /// The engine rejected the command.
    EngineStatus {
        /// Engine status code.
        code: EngineErrorCode,
        /// Engine-provided description.
        message: String,
    },
    /// Anything else, e.g. a panicking engine client.
    Other {
        /// Description of the problem.
        message: String,
    },
}

impl CorrelationFailure {
    /// Stable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ActivationConditionNotMet { .. } => ACTIVATION_CONDITION_NOT_MET,
            Self::InvalidInput { .. } => INVALID_INPUT,
            Self::EngineStatus { .. } => ENGINE_STATUS,
            Self::Other { .. } => OTHER,
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> String {
        match self {
            Self::ActivationConditionNotMet { .. } => {
                "Activation condition didn't match".to_owned()
            }
            Self::InvalidInput { message } | Self::Other { message } => message.clone(),
            Self::EngineStatus { code, message } => format!("{code}: {message}"),
        }
    }

    /// How the calling executable should treat the failure.
    pub fn handling_strategy(&self) -> FailureHandlingStrategy {
        match self {
            Self::ActivationConditionNotMet {
                consume_unmatched_events: true,
            } => FailureHandlingStrategy::Ignore,
            Self::ActivationConditionNotMet { .. } | Self::InvalidInput { .. } => {
                FailureHandlingStrategy::ForwardErrorToUpstream { retryable: false }
            }
            Self::EngineStatus { code, .. } => FailureHandlingStrategy::ForwardErrorToUpstream {
                retryable: code.is_transient(),
            },
            Self::Other { .. } => {
                FailureHandlingStrategy::ForwardErrorToUpstream { retryable: true }
            }
        }
    }
}

/// Advice to the executable on reacting to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureHandlingStrategy {
    /// Report the error to the external source (reject, nack, HTTP error).
    ForwardErrorToUpstream {
        /// Whether redelivering the same payload may succeed.
        retryable: bool,
    },
    /// Acknowledge and drop the payload.
    Ignore,
}

/// Which element of a group accepts a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationCheck {
    /// Exactly one element matched.
    Activated(ProcessElement),
    /// No element matched.
    NoMatchingElement {
        /// Whether any element asked to consume unmatched payloads.
        consume_unmatched_events: bool,
    },
    /// More than one element matched.
    TooManyMatchingElements,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        CorrelationFailure::ActivationConditionNotMet { consume_unmatched_events: true },
        FailureHandlingStrategy::Ignore
    )]
    #[case(
        CorrelationFailure::ActivationConditionNotMet { consume_unmatched_events: false },
        FailureHandlingStrategy::ForwardErrorToUpstream { retryable: false }
    )]
    #[case(
        CorrelationFailure::InvalidInput { message: "bad".into() },
        FailureHandlingStrategy::ForwardErrorToUpstream { retryable: false }
    )]
    #[case(
        CorrelationFailure::EngineStatus { code: EngineErrorCode::Unavailable, message: "down".into() },
        FailureHandlingStrategy::ForwardErrorToUpstream { retryable: true }
    )]
    #[case(
        CorrelationFailure::EngineStatus { code: EngineErrorCode::NotFound, message: "gone".into() },
        FailureHandlingStrategy::ForwardErrorToUpstream { retryable: false }
    )]
    #[case(
        CorrelationFailure::Other { message: "boom".into() },
        FailureHandlingStrategy::ForwardErrorToUpstream { retryable: true }
    )]
    fn handling_strategy(
        #[case] failure: CorrelationFailure,
        #[case] expected: FailureHandlingStrategy,
    ) {
        assert_eq!(failure.handling_strategy(), expected);
    }

    #[test]
    fn condition_not_met_is_distinguishable() {
        let failure = CorrelationFailure::ActivationConditionNotMet {
            consume_unmatched_events: false,
        };
        assert_eq!(failure.reason(), ACTIVATION_CONDITION_NOT_MET);
        assert_ne!(
            CorrelationFailure::Other {
                message: String::new()
            }
            .reason(),
            ACTIVATION_CONDITION_NOT_MET
        );
    }
}
