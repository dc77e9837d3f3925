//! Generic resource object, metadata and collection addressing.
//!
//! # Responsibility
//! - Describe one typed object as `{apiVersion, kind, metadata, spec}`.
//! - Provide typed accessors over the untyped `spec` document.
//!
//! # Invariants
//! - `spec` is an arbitrary JSON document; unknown fields round-trip unchanged.
//! - Accessors fail with `ValidationError` on type mismatch instead of coercing.
//! - `ResourceVersion` values are opaque decimal strings on the wire.

use crate::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Group/version/resource triple selecting one typed collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Returns the `apiVersion` string for objects in this collection.
    ///
    /// The core group (empty `group`) is rendered as the bare version.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl Display for GroupVersionResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

/// Registered resource type: a collection address plus its object kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub gvr: GroupVersionResource,
    /// Singular CamelCase kind, e.g. `Dashboard`.
    pub kind: String,
}

impl ResourceType {
    pub fn new(gvr: GroupVersionResource, kind: impl Into<String>) -> Self {
        Self {
            gvr,
            kind: kind.into(),
        }
    }

    pub fn api_version(&self) -> String {
        self.gvr.api_version()
    }

    /// Kind reported on list envelopes, e.g. `DashboardList`.
    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

/// Position of a mutation in one collection's history.
///
/// Strictly increasing per collection; `0` means "nothing written yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResourceVersion(pub u64);

impl ResourceVersion {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ResourceVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceVersion {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self).map_err(|_| {
            ValidationError::invalid(
                "metadata.resourceVersion",
                format!("`{value}` is not a resource version issued by this server"),
            )
        })
    }
}

/// Object metadata. Identity fields are server-owned except `name`/`generateName`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Unique within the collection. May be empty on create when `generate_name` is set.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// One typed object as stored and returned by the API server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObject {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default = "empty_spec")]
    pub spec: Value,
}

fn empty_spec() -> Value {
    Value::Object(Map::new())
}

impl ResourceObject {
    /// Creates an unnamed object of the given type with the given spec.
    pub fn new(resource_type: &ResourceType, spec: Value) -> Self {
        Self {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
            metadata: ObjectMeta::default(),
            spec,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    pub fn with_generate_name(mut self, prefix: impl Into<String>) -> Self {
        self.metadata.generate_name = Some(prefix.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Parses the stored resource version.
    ///
    /// Returns `Ok(None)` when the object carries no version (e.g. create input).
    pub fn resource_version(&self) -> Result<Option<ResourceVersion>, ValidationError> {
        let raw = self.metadata.resource_version.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }

    /// Returns one top-level `spec` field, or `None` when absent.
    pub fn spec_field(&self, field: &str) -> Option<&Value> {
        self.spec.as_object().and_then(|spec| spec.get(field))
    }

    /// Returns one top-level `spec` field as a string.
    ///
    /// # Errors
    /// - `spec.<field>: required` when the field is missing or null.
    /// - `spec.<field>: expected string` when the field has another JSON type.
    pub fn spec_str(&self, field: &str) -> Result<&str, ValidationError> {
        let path = format!("spec.{field}");
        match self.spec_field(field) {
            None | Some(Value::Null) => Err(ValidationError::required(path)),
            Some(Value::String(value)) => Ok(value.as_str()),
            Some(other) => Err(ValidationError::type_mismatch(
                path,
                "string",
                json_type_name(other),
            )),
        }
    }
}

/// List metadata carried on collection responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    /// Collection resource version at the moment the snapshot was taken.
    #[serde(default)]
    pub resource_version: String,
}

/// Snapshot of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<ResourceObject>,
}

impl ResourceList {
    pub fn new(
        resource_type: &ResourceType,
        resource_version: ResourceVersion,
        items: Vec<ResourceObject>,
    ) -> Self {
        Self {
            api_version: resource_type.api_version(),
            kind: resource_type.list_kind(),
            metadata: ListMeta {
                resource_version: resource_version.to_string(),
            },
            items,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(ResourceObject::name).collect()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
