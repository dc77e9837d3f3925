//! Resource store contracts and shared admission helpers.
//!
//! # Responsibility
//! - Define the per-collection CRUD contract used by the API server.
//! - Share create/update admission between storage backends.
//!
//! # Invariants
//! - Write paths validate before taking the collection's mutation lock and
//!   never mutate state when validation fails.
//! - Name uniqueness checks, name generation and insertion happen inside one
//!   critical section.
//! - Every mutation (create, update, delete) advances the collection
//!   resource version exactly once.

use crate::db::DbError;
use crate::model::object::{ResourceList, ResourceObject, ResourceType, ResourceVersion};
use crate::names::NameGenerationError;
use crate::validation::{validate_object, ResourceValidator, ValidationError};
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod memory;
pub mod sqlite;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for one collection.
#[derive(Debug)]
pub enum StoreError {
    Invalid(ValidationError),
    AlreadyExists {
        name: String,
    },
    NotFound {
        name: String,
    },
    NameGenerationExhausted(NameGenerationError),
    /// Caller-supplied resource version is stale.
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },
    Db(DbError),
    InvalidData(String),
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "invalid object: {err}"),
            Self::AlreadyExists { name } => write!(f, "object `{name}` already exists"),
            Self::NotFound { name } => write!(f, "object `{name}` not found"),
            Self::NameGenerationExhausted(err) => write!(f, "{err}"),
            Self::Conflict {
                name,
                expected,
                actual,
            } => write!(
                f,
                "object `{name}` has been modified: resourceVersion {expected} is stale, current is {actual}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
            Self::LockPoisoned => write!(f, "collection lock poisoned by a panicked writer"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::NameGenerationExhausted(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::AlreadyExists { .. }
            | Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::InvalidData(_)
            | Self::LockPoisoned => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<NameGenerationError> for StoreError {
    fn from(value: NameGenerationError) -> Self {
        Self::NameGenerationExhausted(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Optional list filter. The default lists every live object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Keep only objects whose name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Maximum number of items, applied after filtering.
    pub limit: Option<u32>,
}

impl ListOptions {
    pub fn matches(&self, name: &str) -> bool {
        self.name_prefix
            .as_deref()
            .map_or(true, |prefix| name.starts_with(prefix))
    }
}

/// CRUD contract for one group/version/resource collection.
///
/// Implementations must be safe to share across threads.
pub trait ResourceStore: Send + Sync {
    fn resource_type(&self) -> &ResourceType;
    /// Inserts a new object, generating its name from `generateName` when empty.
    fn create(&self, obj: &ResourceObject) -> StoreResult<ResourceObject>;
    fn get(&self, name: &str) -> StoreResult<ResourceObject>;
    /// Returns live objects in insertion order.
    fn list(&self, options: &ListOptions) -> StoreResult<ResourceList>;
    /// Replaces the spec of an existing object.
    fn update(&self, obj: &ResourceObject) -> StoreResult<ResourceObject>;
    fn delete(&self, name: &str) -> StoreResult<()>;
}

/// Validates a create request and normalizes its type fields.
///
/// Server-owned metadata sent by the caller is discarded.
pub(crate) fn admit_create(
    resource_type: &ResourceType,
    validator: &dyn ResourceValidator,
    obj: &ResourceObject,
) -> StoreResult<ResourceObject> {
    validate_object(resource_type, validator, obj)?;

    let mut admitted = obj.clone();
    admitted.api_version = resource_type.api_version();
    admitted.kind = resource_type.kind.clone();
    admitted.metadata.resource_version.clear();
    admitted.metadata.uid = None;
    admitted.metadata.creation_timestamp = None;
    Ok(admitted)
}

/// Validates an update request; returns the normalized object and the
/// resource version the caller expects, if any.
pub(crate) fn admit_update(
    resource_type: &ResourceType,
    validator: &dyn ResourceValidator,
    obj: &ResourceObject,
) -> StoreResult<(ResourceObject, Option<ResourceVersion>)> {
    if obj.metadata.name.is_empty() {
        return Err(ValidationError::required("metadata.name").into());
    }
    validate_object(resource_type, validator, obj)?;
    let expected = obj.resource_version()?;

    let mut admitted = obj.clone();
    admitted.api_version = resource_type.api_version();
    admitted.kind = resource_type.kind.clone();
    Ok((admitted, expected))
}

/// Stamps server-owned identity on a freshly admitted object.
pub(crate) fn stamp_created(
    obj: &mut ResourceObject,
    name: String,
    resource_version: ResourceVersion,
    now: DateTime<Utc>,
) {
    obj.metadata.name = name;
    obj.metadata.uid = Some(Uuid::new_v4());
    obj.metadata.creation_timestamp = Some(now);
    obj.metadata.resource_version = resource_version.to_string();
}

/// Carries immutable identity from the stored object onto an update.
pub(crate) fn stamp_updated(
    obj: &mut ResourceObject,
    current: &ResourceObject,
    resource_version: ResourceVersion,
) {
    obj.metadata.generate_name = current.metadata.generate_name.clone();
    obj.metadata.uid = current.metadata.uid;
    obj.metadata.creation_timestamp = current.metadata.creation_timestamp;
    obj.metadata.resource_version = resource_version.to_string();
}

/// Fails with `Conflict` when the caller's expected version is stale.
pub(crate) fn check_expected_version(
    name: &str,
    expected: Option<ResourceVersion>,
    actual: ResourceVersion,
) -> StoreResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(StoreError::Conflict {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        _ => Ok(()),
    }
}
