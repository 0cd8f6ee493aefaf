//! Property names the runtime reads from an element's configuration.
//!
//! Connector properties and runtime keywords share one flat key/value map on
//! the element. The sets below decide which keys an executable sees and
//! which keys take part in deduplication and group validation.

/// Connector type name.
pub const INBOUND_TYPE: &str = "inbound.type";

/// Deduplication mode (`AUTO` or `MANUAL`).
pub const DEDUPLICATION_MODE: &str = "deduplicationMode";

/// Older spelling of [`DEDUPLICATION_MODE`] written by early element templates.
pub const DEDUPLICATION_MODE_LEGACY: &str = "inbound.deduplicationMode";

/// Explicit deduplication id, required in `MANUAL` mode.
pub const DEDUPLICATION_ID: &str = "deduplicationId";

/// UI flag the element template uses to toggle manual deduplication.
pub const DEDUPLICATION_MODE_MANUAL_FLAG: &str = "deduplicationModeManualFlag";

/// Expression producing the message id for published messages.
pub const MESSAGE_ID_EXPRESSION: &str = "messageIdExpression";

/// Expression producing the correlation key for published messages.
pub const CORRELATION_KEY_EXPRESSION: &str = "correlationKeyExpression";

/// Boolean expression filtering inbound payloads.
pub const ACTIVATION_CONDITION: &str = "activationCondition";

/// Deprecated alias of [`ACTIVATION_CONDITION`].
pub const ACTIVATION_CONDITION_LEGACY: &str = "inbound.activationCondition";

/// Whether payloads matching no activation condition are acknowledged and dropped.
pub const CONSUME_UNMATCHED_EVENTS: &str = "consumeUnmatchedEvents";

/// Time-to-live of published messages.
pub const MESSAGE_TTL: &str = "messageTtl";

/// Whether a correlation key is mandatory for the connector.
pub const CORRELATION_REQUIRED: &str = "correlationRequired";

/// Name of the process variable receiving the whole payload.
pub const RESULT_VARIABLE: &str = "resultVariable";

/// Expression mapping the payload to process variables.
pub const RESULT_EXPRESSION: &str = "resultExpression";

/// Keys the runtime consumes itself; stripped from the properties an
/// executable binds to.
pub const RUNTIME_PROPERTIES: &[&str] = &[
    INBOUND_TYPE,
    DEDUPLICATION_MODE,
    DEDUPLICATION_MODE_LEGACY,
    DEDUPLICATION_ID,
    MESSAGE_ID_EXPRESSION,
    CORRELATION_KEY_EXPRESSION,
    ACTIVATION_CONDITION,
    ACTIVATION_CONDITION_LEGACY,
    CONSUME_UNMATCHED_EVENTS,
    MESSAGE_TTL,
];

/// Keys allowed to differ between elements sharing a deduplication id.
///
/// Superset of [`RUNTIME_PROPERTIES`]: result mapping and correlation flags
/// are evaluated per element, so they never split a listener either.
pub const DEDUPLICATION_EXCLUDED_PROPERTIES: &[&str] = &[
    INBOUND_TYPE,
    DEDUPLICATION_MODE,
    DEDUPLICATION_MODE_LEGACY,
    DEDUPLICATION_ID,
    DEDUPLICATION_MODE_MANUAL_FLAG,
    MESSAGE_ID_EXPRESSION,
    CORRELATION_KEY_EXPRESSION,
    ACTIVATION_CONDITION,
    ACTIVATION_CONDITION_LEGACY,
    CONSUME_UNMATCHED_EVENTS,
    MESSAGE_TTL,
    CORRELATION_REQUIRED,
    RESULT_VARIABLE,
    RESULT_EXPRESSION,
];

/// Returns `true` if `key` is consumed by the runtime.
pub fn is_runtime_property(key: &str) -> bool {
    RUNTIME_PROPERTIES.contains(&key)
}

/// Returns `true` if `key` is ignored when comparing or hashing configurations.
pub fn is_excluded_from_deduplication(key: &str) -> bool {
    DEDUPLICATION_EXCLUDED_PROPERTIES.contains(&key)
}
