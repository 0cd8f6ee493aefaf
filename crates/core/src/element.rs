//! Workflow-model elements carrying inbound connector configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::correlation_point::CorrelationPoint;
use crate::error::ElementError;
use crate::id::{ConnectorType, DeduplicationId, ElementId, ProcessId, TenantId};
use crate::keywords;

/// Identity of an element inside a deployed process definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessElement {
    /// BPMN process id.
    pub process_id: ProcessId,
    /// Version of the process definition.
    pub version: i32,
    /// Engine key of the process definition.
    pub process_definition_key: i64,
    /// Element id inside the definition.
    pub element_id: ElementId,
    /// Owning tenant.
    pub tenant_id: TenantId,
}

/// How an element's deduplication id is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeduplicationMode {
    /// Hash of the connector configuration.
    Auto,
    /// Taken verbatim from the `deduplicationId` property.
    Manual,
    /// No mode configured: one listener per element.
    Legacy,
}

/// One element with inbound connector configuration.
///
/// Immutable once constructed. The connector type is read from
/// `inbound.type` at construction, so every instance has one.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorElement {
    element: ProcessElement,
    connector_type: ConnectorType,
    raw_properties: BTreeMap<String, String>,
    correlation_point: CorrelationPoint,
}

impl ConnectorElement {
    /// Build an element from parsed process-model data.
    pub fn new(
        raw_properties: BTreeMap<String, String>,
        correlation_point: CorrelationPoint,
        element: ProcessElement,
    ) -> Result<Self, ElementError> {
        let connector_type = raw_properties
            .get(keywords::INBOUND_TYPE)
            .filter(|ty| !ty.trim().is_empty())
            .map(|ty| ConnectorType::new(ty.as_str()))
            .ok_or_else(|| ElementError::MissingConnectorType {
                element_id: element.element_id.to_string(),
            })?;

        Ok(Self {
            element,
            connector_type,
            raw_properties,
            correlation_point,
        })
    }

    /// Process identity of the element.
    pub fn element(&self) -> &ProcessElement {
        &self.element
    }

    /// Element id inside its process definition.
    pub fn element_id(&self) -> &ElementId {
        &self.element.element_id
    }

    /// Owning tenant.
    pub fn tenant_id(&self) -> &TenantId {
        &self.element.tenant_id
    }

    /// Connector type name.
    pub fn connector_type(&self) -> &ConnectorType {
        &self.connector_type
    }

    /// Correlation target of the element.
    pub fn correlation_point(&self) -> &CorrelationPoint {
        &self.correlation_point
    }

    /// All configured properties, runtime keywords included.
    pub fn raw_properties(&self) -> &BTreeMap<String, String> {
        &self.raw_properties
    }

    /// Properties that must agree between elements sharing a listener.
    pub fn raw_properties_without_keywords(&self) -> BTreeMap<String, String> {
        self.raw_properties
            .iter()
            .filter(|(key, _)| !keywords::is_excluded_from_deduplication(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Properties an executable binds its configuration from.
    pub fn connector_properties(&self) -> BTreeMap<String, String> {
        self.raw_properties
            .iter()
            .filter(|(key, _)| !keywords::is_runtime_property(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn property(&self, key: &str) -> Option<&str> {
        self.raw_properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Activation condition, falling back to the deprecated `inbound.` spelling.
    pub fn activation_condition(&self) -> Option<&str> {
        self.property(keywords::ACTIVATION_CONDITION)
            .or_else(|| self.property(keywords::ACTIVATION_CONDITION_LEGACY))
    }

    /// Name of the variable receiving the whole payload.
    pub fn result_variable(&self) -> Option<&str> {
        self.property(keywords::RESULT_VARIABLE)
    }

    /// Expression mapping the payload to process variables.
    pub fn result_expression(&self) -> Option<&str> {
        self.property(keywords::RESULT_EXPRESSION)
    }

    /// Whether payloads matching no condition are acknowledged and dropped.
    pub fn consume_unmatched_events(&self) -> bool {
        self.property(keywords::CONSUME_UNMATCHED_EVENTS)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    /// Message id expression of the correlation point, else of the properties.
    pub fn message_id_expression(&self) -> Option<&str> {
        self.correlation_point
            .message()
            .and_then(|m| m.message_id_expression.as_deref())
            .or_else(|| self.property(keywords::MESSAGE_ID_EXPRESSION))
    }

    /// Correlation key expression of the correlation point, else of the properties.
    pub fn correlation_key_expression(&self) -> Option<&str> {
        self.correlation_point
            .message()
            .and_then(|m| m.correlation_key_expression.as_deref())
            .or_else(|| self.property(keywords::CORRELATION_KEY_EXPRESSION))
    }

    /// Message time-to-live of the correlation point, else of the `messageTtl`
    /// property.
    ///
    /// The property is an ISO-8601 duration as element templates write it
    /// (`PT30S`, `P1DT2H`), plain seconds, or a humantime string (`5m`). An
    /// unparseable value is logged and treated as absent.
    pub fn message_ttl(&self) -> Option<Duration> {
        if let Some(ttl) = self.correlation_point.message().and_then(|m| m.time_to_live) {
            return Some(ttl);
        }
        let raw = self.property(keywords::MESSAGE_TTL)?.trim();
        let ttl = parse_iso8601_duration(raw)
            .or_else(|| raw.parse::<u64>().ok().map(Duration::from_secs))
            .or_else(|| humantime::parse_duration(raw).ok());
        if ttl.is_none() {
            tracing::warn!(
                element_id = %self.element.element_id,
                value = raw,
                "ignoring unparseable messageTtl"
            );
        }
        ttl
    }

    /// Configured deduplication mode.
    pub fn deduplication_mode(&self) -> Result<DeduplicationMode, ElementError> {
        let mode = self
            .property(keywords::DEDUPLICATION_MODE)
            .or_else(|| self.property(keywords::DEDUPLICATION_MODE_LEGACY));
        match mode.map(str::trim) {
            None => Ok(DeduplicationMode::Legacy),
            Some(m) if m.eq_ignore_ascii_case("AUTO") => Ok(DeduplicationMode::Auto),
            Some(m) if m.eq_ignore_ascii_case("MANUAL") => Ok(DeduplicationMode::Manual),
            Some(m) => Err(ElementError::UnknownDeduplicationMode {
                element_id: self.element.element_id.to_string(),
                mode: m.to_owned(),
            }),
        }
    }

    /// Derive the deduplication id of this element.
    ///
    /// `scope` lists the properties hashed in `AUTO` mode for this connector
    /// type; when empty every property outside the keyword set is hashed.
    pub fn deduplication_id(&self, scope: &[String]) -> Result<DeduplicationId, ElementError> {
        match self.deduplication_mode()? {
            DeduplicationMode::Manual => self
                .property(keywords::DEDUPLICATION_ID)
                .map(DeduplicationId::from)
                .ok_or_else(|| ElementError::MissingDeduplicationId {
                    element_id: self.element.element_id.to_string(),
                }),
            DeduplicationMode::Auto => Ok(DeduplicationId::new(format!(
                "{}-{}-{}",
                self.element.tenant_id,
                self.element.process_id,
                self.configuration_digest(scope)
            ))),
            DeduplicationMode::Legacy => Ok(DeduplicationId::new(format!(
                "{}-{}-{}",
                self.element.tenant_id,
                self.element.process_definition_key,
                self.element.element_id
            ))),
        }
    }

    fn configuration_digest(&self, scope: &[String]) -> String {
        let properties = if scope.is_empty() {
            self.raw_properties_without_keywords()
        } else {
            self.raw_properties
                .iter()
                .filter(|(key, _)| scope.iter().any(|s| s == *key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };

        let mut hasher = Sha256::new();
        for (key, value) in &properties {
            hasher.update(key.as_bytes());
            hasher.update([0x1f_u8]);
            hasher.update(value.as_bytes());
            hasher.update([0x1e_u8]);
        }
        hex::encode(hasher.finalize())
    }
}

// Property values may carry credentials; only keys are printed.
impl fmt::Debug for ConnectorElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorElement")
            .field("element", &self.element)
            .field("connector_type", &self.connector_type)
            .field("property_keys", &self.raw_properties.keys().collect::<Vec<_>>())
            .field("correlation_point", &self.correlation_point.kind())
            .finish()
    }
}

/// Parse `P[nD][T[nH][nM][n[.n]S]]`, case-insensitive.
///
/// Years, months and weeks are rejected: their length is calendar-dependent.
fn parse_iso8601_duration(raw: &str) -> Option<Duration> {
    let upper = raw.to_ascii_uppercase();
    let rest = upper.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return None,
        None => (rest, None),
    };
    if date.is_empty() && time.is_none() {
        return None;
    }

    let mut total = Duration::ZERO;
    if !date.is_empty() {
        let days: u64 = date.strip_suffix('D')?.parse().ok()?;
        total = Duration::from_secs(days.checked_mul(86_400)?);
    }
    if let Some(mut time) = time {
        for (unit, seconds) in [('H', 3_600_u64), ('M', 60)] {
            if let Some((value, tail)) = time.split_once(unit) {
                let value: u64 = value.parse().ok()?;
                total = total.checked_add(Duration::from_secs(value.checked_mul(seconds)?))?;
                time = tail;
            }
        }
        if !time.is_empty() {
            let seconds: f64 = time.strip_suffix('S')?.parse().ok()?;
            total = total.checked_add(Duration::try_from_secs_f64(seconds).ok()?)?;
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::correlation_point::MessageCorrelation;

    // ---------------------------------------------------------------------------
    // Test helpers
    // ---------------------------------------------------------------------------

    fn process_element(element_id: &str) -> ProcessElement {
        ProcessElement {
            process_id: ProcessId::new("order-process"),
            version: 1,
            process_definition_key: 2_251_799_813_685_249,
            element_id: ElementId::new(element_id),
            tenant_id: TenantId::new("default"),
        }
    }

    fn element_with(element_id: &str, props: &[(&str, &str)]) -> ConnectorElement {
        let raw = props
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ConnectorElement::new(raw, CorrelationPoint::StartEvent, process_element(element_id))
            .unwrap()
    }

    // ---------------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------------

    #[test]
    fn missing_type_is_rejected() {
        let err = ConnectorElement::new(
            BTreeMap::new(),
            CorrelationPoint::StartEvent,
            process_element("start"),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing connector type property. The connector element template is not valid"
        );
        assert_eq!(err.element_id(), "start");
    }

    #[test]
    fn debug_hides_property_values() {
        let element = element_with("start", &[("inbound.type", "webhook"), ("secret", "hunter2")]);
        let rendered = format!("{element:?}");
        assert!(rendered.contains("secret"));
        assert!(!rendered.contains("hunter2"));
    }

    // ---------------------------------------------------------------------------
    // Property views
    // ---------------------------------------------------------------------------

    #[test]
    fn keyword_free_view_drops_every_excluded_key() {
        let element = element_with(
            "start",
            &[
                ("inbound.type", "webhook"),
                ("messageIdExpression", "=id"),
                ("resultVariable", "payload"),
                ("path", "/orders"),
            ],
        );

        let expected: BTreeMap<String, String> =
            [("path".to_owned(), "/orders".to_owned())].into();
        assert_eq!(element.raw_properties_without_keywords(), expected);
    }

    #[test]
    fn connector_view_keeps_result_mapping() {
        let element = element_with(
            "start",
            &[("inbound.type", "webhook"), ("resultVariable", "payload")],
        );
        assert!(element.connector_properties().contains_key("resultVariable"));
        assert!(!element.connector_properties().contains_key("inbound.type"));
    }

    #[test]
    fn activation_condition_falls_back_to_legacy_key() {
        let element = element_with(
            "start",
            &[("inbound.type", "webhook"), ("inbound.activationCondition", "=ok")],
        );
        assert_eq!(element.activation_condition(), Some("=ok"));
    }

    #[rstest]
    #[case("PT30S", Some(Duration::from_secs(30)))]
    #[case("PT1H", Some(Duration::from_hours(1)))]
    #[case("P1DT2H30M", Some(Duration::from_secs(95_400)))]
    #[case("PT0.5S", Some(Duration::from_millis(500)))]
    #[case("pt10m", Some(Duration::from_mins(10)))]
    #[case("60", Some(Duration::from_mins(1)))]
    #[case("5m", Some(Duration::from_mins(5)))]
    #[case("PT", None)]
    #[case("P1Y", None)]
    #[case("PTxS", None)]
    #[case("soon", None)]
    fn message_ttl_from_property(#[case] raw: &str, #[case] expected: Option<Duration>) {
        let element = element_with("start", &[("inbound.type", "webhook"), ("messageTtl", raw)]);
        assert_eq!(element.message_ttl(), expected);
    }

    #[test]
    fn correlation_point_ttl_wins_over_property() {
        let element = ConnectorElement::new(
            [
                ("inbound.type".to_owned(), "webhook".to_owned()),
                ("messageTtl".to_owned(), "60".to_owned()),
            ]
            .into(),
            CorrelationPoint::Message(
                MessageCorrelation::new("m").with_time_to_live(Duration::from_secs(5)),
            ),
            process_element("catch"),
        )
        .unwrap();
        assert_eq!(element.message_ttl(), Some(Duration::from_secs(5)));
    }

    // ---------------------------------------------------------------------------
    // Deduplication ids
    // ---------------------------------------------------------------------------

    #[test]
    fn legacy_mode_is_one_listener_per_element() {
        let element = element_with("start", &[("inbound.type", "webhook")]);
        assert_eq!(
            element.deduplication_id(&[]).unwrap().as_str(),
            "default-2251799813685249-start"
        );
    }

    #[test]
    fn manual_mode_uses_property_verbatim() {
        let element = element_with(
            "start",
            &[
                ("inbound.type", "webhook"),
                ("deduplicationMode", "MANUAL"),
                ("deduplicationId", "shared-listener"),
            ],
        );
        assert_eq!(element.deduplication_id(&[]).unwrap().as_str(), "shared-listener");
    }

    #[test]
    fn manual_mode_without_id_fails() {
        let element = element_with(
            "start",
            &[("inbound.type", "webhook"), ("deduplicationMode", "MANUAL")],
        );
        assert!(matches!(
            element.deduplication_id(&[]),
            Err(ElementError::MissingDeduplicationId { .. })
        ));
    }

    #[test]
    fn auto_mode_ignores_type_and_keywords() {
        let a = element_with(
            "a",
            &[
                ("inbound.type", "type1"),
                ("deduplicationMode", "AUTO"),
                ("path", "/orders"),
                ("messageIdExpression", "=a"),
            ],
        );
        let b = element_with(
            "b",
            &[
                ("inbound.type", "type2"),
                ("deduplicationMode", "AUTO"),
                ("path", "/orders"),
            ],
        );
        assert_eq!(a.deduplication_id(&[]).unwrap(), b.deduplication_id(&[]).unwrap());
    }

    #[test]
    fn auto_mode_splits_on_connector_property() {
        let a = element_with(
            "a",
            &[("inbound.type", "webhook"), ("deduplicationMode", "AUTO"), ("path", "/a")],
        );
        let b = element_with(
            "b",
            &[("inbound.type", "webhook"), ("deduplicationMode", "AUTO"), ("path", "/b")],
        );
        assert_ne!(a.deduplication_id(&[]).unwrap(), b.deduplication_id(&[]).unwrap());
    }

    #[test]
    fn auto_mode_scope_limits_hashed_properties() {
        let scope = vec!["queue".to_owned()];
        let a = element_with(
            "a",
            &[
                ("inbound.type", "sqs"),
                ("deduplicationMode", "AUTO"),
                ("queue", "orders"),
                ("pollInterval", "5s"),
            ],
        );
        let b = element_with(
            "b",
            &[
                ("inbound.type", "sqs"),
                ("deduplicationMode", "AUTO"),
                ("queue", "orders"),
                ("pollInterval", "30s"),
            ],
        );
        assert_eq!(a.deduplication_id(&scope).unwrap(), b.deduplication_id(&scope).unwrap());
        assert_ne!(a.deduplication_id(&[]).unwrap(), b.deduplication_id(&[]).unwrap());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let element = element_with(
            "start",
            &[("inbound.type", "webhook"), ("deduplicationMode", "SOMETIMES")],
        );
        assert_eq!(
            element.deduplication_id(&[]).unwrap_err().to_string(),
            "Unsupported deduplicationMode 'SOMETIMES'"
        );
    }
}
