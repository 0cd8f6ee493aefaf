//! Errors raised while interpreting an element's configuration.

/// An element's properties cannot be turned into runtime metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
    /// `inbound.type` is absent.
    #[error("Missing connector type property. The connector element template is not valid")]
    MissingConnectorType {
        /// Element that lacks the property.
        element_id: String,
    },

    /// Manual deduplication was requested without an id.
    #[error(
        "Missing deduplicationId property, expected a value due to deduplicationMode=MANUAL"
    )]
    MissingDeduplicationId {
        /// Element that lacks the property.
        element_id: String,
    },

    /// `deduplicationMode` holds a value the runtime does not know.
    #[error("Unsupported deduplicationMode '{mode}'")]
    UnknownDeduplicationMode {
        /// Element carrying the value.
        element_id: String,
        /// The raw value.
        mode: String,
    },
}

impl ElementError {
    /// Element the error refers to.
    pub fn element_id(&self) -> &str {
        match self {
            Self::MissingConnectorType { element_id }
            | Self::MissingDeduplicationId { element_id }
            | Self::UnknownDeduplicationMode { element_id, .. } => element_id,
        }
    }
}
