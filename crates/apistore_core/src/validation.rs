//! Admission validation for candidate objects.
//!
//! # Responsibility
//! - Check type identity and metadata shape common to every resource type.
//! - Delegate spec rules to the per-kind `ResourceValidator`.
//!
//! # Invariants
//! - Validation is pure: it never touches store state.
//! - Unknown spec fields are preserved, never rejected.

use crate::model::object::{json_type_name, ResourceObject, ResourceType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum length of an object name.
pub const MAX_NAME_LEN: usize = 253;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("name pattern is a valid regex")
});

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `spec.title`.
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::invalid(field, "required")
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &str, actual: &str) -> Self {
        Self::invalid(field, format!("expected {expected}, got {actual}"))
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl Error for ValidationError {}

/// Per-kind spec rules.
pub trait ResourceValidator: Send + Sync {
    fn validate(&self, obj: &ResourceObject) -> Result<(), ValidationError>;
}

/// Validator for kinds without spec rules beyond "spec is an object".
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnySpec;

impl ResourceValidator for AcceptAnySpec {
    fn validate(&self, _obj: &ResourceObject) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Runs the full admission check for `obj` against `resource_type`.
///
/// Empty `apiVersion`/`kind` are accepted here; stores default them to the
/// registered type before persisting.
///
/// # Errors
/// - `apiVersion`/`kind` naming another resource type.
/// - Neither `metadata.name` nor `metadata.generateName` set.
/// - Malformed name or prefix.
/// - `spec` not a JSON object.
/// - Any rule reported by `validator`.
pub fn validate_object(
    resource_type: &ResourceType,
    validator: &dyn ResourceValidator,
    obj: &ResourceObject,
) -> Result<(), ValidationError> {
    let expected_api_version = resource_type.api_version();
    if !obj.api_version.is_empty() && obj.api_version != expected_api_version {
        return Err(ValidationError::invalid(
            "apiVersion",
            format!(
                "must be `{expected_api_version}`, got `{}`",
                obj.api_version
            ),
        ));
    }
    if !obj.kind.is_empty() && obj.kind != resource_type.kind {
        return Err(ValidationError::invalid(
            "kind",
            format!("must be `{}`, got `{}`", resource_type.kind, obj.kind),
        ));
    }

    validate_identity(obj)?;

    if !obj.spec.is_object() {
        return Err(ValidationError::type_mismatch(
            "spec",
            "object",
            json_type_name(&obj.spec),
        ));
    }

    validator.validate(obj)
}

fn validate_identity(obj: &ResourceObject) -> Result<(), ValidationError> {
    let name = obj.metadata.name.as_str();
    let generate_name = obj.metadata.generate_name.as_deref().unwrap_or_default();

    if name.is_empty() {
        if generate_name.is_empty() {
            return Err(ValidationError::invalid(
                "metadata.name",
                "name or generateName is required",
            ));
        }
        return validate_prefix(generate_name);
    }

    // Explicit names win; a prefix sent alongside is still checked for shape.
    if !generate_name.is_empty() {
        validate_prefix(generate_name)?;
    }
    validate_name(name)
}

/// Checks that `name` is a lowercase DNS-subdomain-like identifier.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::invalid(
            "metadata.name",
            format!("must be no more than {MAX_NAME_LEN} characters"),
        ));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(ValidationError::invalid(
            "metadata.name",
            format!(
                "`{name}` must consist of lowercase alphanumeric characters, '-' or '.', \
                 and must start and end with an alphanumeric character"
            ),
        ));
    }
    Ok(())
}

/// Checks that every name generated from `prefix` is itself a valid name.
///
/// Generated suffixes are lowercase alphanumeric, so appending one such
/// character stands in for any suffix.
fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    validate_name(&format!("{prefix}x")).map_err(|_| {
        ValidationError::invalid(
            "metadata.generateName",
            format!(
                "`{prefix}` must start with a lowercase alphanumeric character, contain only \
                 lowercase alphanumerics, '-' or '.', and not place '.' next to '.' or '-'"
            ),
        )
    })
}
