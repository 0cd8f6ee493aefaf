//! Grouping of connector elements into one logical listener.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use inbound_core::{ConnectorElement, ConnectorType, DeduplicationId, TenantId};

use crate::error::DefinitionError;

/// Outcome of grouping the elements that share a deduplication id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundConnectorDetails {
    /// The elements form one consistent listener.
    Valid(ValidDetails),
    /// The elements disagree; the registration is recorded DOWN.
    Invalid(InvalidDetails),
}

impl InboundConnectorDetails {
    /// Listener key.
    pub fn deduplication_id(&self) -> &DeduplicationId {
        match self {
            Self::Valid(d) => &d.deduplication_id,
            Self::Invalid(d) => &d.deduplication_id,
        }
    }

    /// Connector type (of the first element for invalid groups).
    pub fn connector_type(&self) -> &ConnectorType {
        match self {
            Self::Valid(d) => &d.connector_type,
            Self::Invalid(d) => &d.connector_type,
        }
    }

    /// Tenant (of the first element for invalid groups).
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Valid(d) => &d.tenant_id,
            Self::Invalid(d) => &d.tenant_id,
        }
    }

    /// Grouped elements in canonical order.
    pub fn elements(&self) -> &[ConnectorElement] {
        match self {
            Self::Valid(d) => &d.elements,
            Self::Invalid(d) => &d.elements,
        }
    }

    /// Returns `true` for [`InboundConnectorDetails::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// A consistent group.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidDetails {
    connector_type: ConnectorType,
    tenant_id: TenantId,
    deduplication_id: DeduplicationId,
    raw_properties: BTreeMap<String, String>,
    raw_properties_without_keywords: BTreeMap<String, String>,
    elements: Vec<ConnectorElement>,
}

impl ValidDetails {
    /// Shared connector type.
    pub fn connector_type(&self) -> &ConnectorType {
        &self.connector_type
    }

    /// Shared tenant.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Listener key.
    pub fn deduplication_id(&self) -> &DeduplicationId {
        &self.deduplication_id
    }

    /// Canonical configuration: the first element's properties, runtime
    /// keywords included.
    pub fn raw_properties(&self) -> &BTreeMap<String, String> {
        &self.raw_properties
    }

    /// The properties every element agrees on.
    pub fn raw_properties_without_keywords(&self) -> &BTreeMap<String, String> {
        &self.raw_properties_without_keywords
    }

    /// Grouped elements in canonical order.
    pub fn elements(&self) -> &[ConnectorElement] {
        &self.elements
    }

    /// The element whose properties are canonical.
    pub fn first_element(&self) -> &ConnectorElement {
        &self.elements[0]
    }
}

impl fmt::Debug for ValidDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidDetails")
            .field("connector_type", &self.connector_type)
            .field("tenant_id", &self.tenant_id)
            .field("deduplication_id", &self.deduplication_id)
            .field("properties", &self.raw_properties.keys().collect::<Vec<_>>())
            .field("elements", &self.elements)
            .finish()
    }
}

/// An inconsistent group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDetails {
    elements: Vec<ConnectorElement>,
    error: DefinitionError,
    tenant_id: TenantId,
    deduplication_id: DeduplicationId,
    connector_type: ConnectorType,
}

impl InvalidDetails {
    /// What is inconsistent.
    pub fn error(&self) -> &DefinitionError {
        &self.error
    }

    /// Grouped elements in canonical order.
    pub fn elements(&self) -> &[ConnectorElement] {
        &self.elements
    }
}

/// Validate that `elements` form one listener.
///
/// Elements are sorted by process identity first, so any permutation of the
/// same elements gives the same result.
///
/// # Panics
///
/// Panics if `elements` is empty. An empty group is a caller bug.
pub fn group(
    deduplication_id: DeduplicationId,
    mut elements: Vec<ConnectorElement>,
) -> InboundConnectorDetails {
    assert!(
        !elements.is_empty(),
        "cannot group zero elements for deduplication id {deduplication_id}"
    );
    elements.sort_by(|a, b| {
        a.element()
            .cmp(b.element())
            .then_with(|| a.connector_type().cmp(b.connector_type()))
            .then_with(|| a.raw_properties().cmp(b.raw_properties()))
    });

    match validate(&elements) {
        Ok(()) => {
            let first = &elements[0];
            InboundConnectorDetails::Valid(ValidDetails {
                connector_type: first.connector_type().clone(),
                tenant_id: first.tenant_id().clone(),
                deduplication_id,
                raw_properties: first.raw_properties().clone(),
                raw_properties_without_keywords: first.raw_properties_without_keywords(),
                elements,
            })
        }
        Err(error) => {
            let first = &elements[0];
            InboundConnectorDetails::Invalid(InvalidDetails {
                tenant_id: first.tenant_id().clone(),
                connector_type: first.connector_type().clone(),
                deduplication_id,
                error,
                elements,
            })
        }
    }
}

fn validate(elements: &[ConnectorElement]) -> Result<(), DefinitionError> {
    let types: BTreeSet<&ConnectorType> =
        elements.iter().map(ConnectorElement::connector_type).collect();
    if types.len() > 1 {
        return Err(DefinitionError::TypeMismatch {
            types: types.into_iter().cloned().collect(),
        });
    }

    let tenants: BTreeSet<&TenantId> = elements.iter().map(ConnectorElement::tenant_id).collect();
    if tenants.len() > 1 {
        return Err(DefinitionError::TenantMismatch {
            tenants: tenants.into_iter().cloned().collect(),
        });
    }

    let distinct: BTreeSet<BTreeMap<String, String>> = elements
        .iter()
        .map(ConnectorElement::raw_properties_without_keywords)
        .collect();
    if distinct.len() > 1 {
        return Err(DefinitionError::PropertyMismatch {
            properties: diverging_keys(&distinct),
        });
    }
    Ok(())
}

/// Keys on which the maps do not all agree, sorted.
fn diverging_keys(maps: &BTreeSet<BTreeMap<String, String>>) -> Vec<String> {
    let keys: BTreeSet<&String> = maps.iter().flat_map(BTreeMap::keys).collect();
    keys.into_iter()
        .filter(|key| {
            let mut values = maps.iter().map(|m| m.get(*key));
            let first = values.next().flatten();
            values.any(|v| v != first)
        })
        .cloned()
        .collect()
}
