//! Identifiers used across the inbound runtime.
//!
//! Workflow-model identifiers (tenants, processes, elements, connector types,
//! deduplication keys) are opaque strings handed to us by the deployment
//! importer, so they are modelled as string newtypes rather than UUIDs.
//! [`ExecutableId`] is the only identifier the runtime mints itself: one per
//! activation attempt, used to tell a live executable instance apart from a
//! superseded one.
//!
//! All string identifiers support:
//! - `new(impl Into<String>)` and `From<&str>` / `From<String>`
//! - `as_str()` and `Borrow<str>` for map lookups
//! - Transparent serde (serializes as a plain string)
//! - `Display`, `Eq`, `Ord`, `Hash`

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the owned string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Tenant that owns a process definition.
    TenantId
);
string_id!(
    /// BPMN process id (the `bpmnProcessId`, stable across versions).
    ProcessId
);
string_id!(
    /// Id of a single element inside a process definition.
    ElementId
);
string_id!(
    /// Connector type name, e.g. `io.camunda:webhook:1`.
    ConnectorType
);
string_id!(
    /// Key grouping elements that form one logical inbound listener.
    DeduplicationId
);

/// Identifier of one activated executable instance.
///
/// A fresh id is minted for every activation attempt. Health reports and
/// cancellation requests carry it so the registry can ignore callbacks from
/// an instance that has since been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableId(uuid::Uuid);

impl ExecutableId {
    /// Generate a random id.
    pub fn v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for ExecutableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
