//! Dashboard resource type registration and spec rules.

use crate::model::object::{GroupVersionResource, ResourceObject, ResourceType};
use crate::validation::{ResourceValidator, ValidationError};
use serde_json::json;

pub const DASHBOARD_GROUP: &str = "dashboard.grafana.app";
pub const DASHBOARD_VERSION: &str = "v1alpha1";
pub const DASHBOARD_RESOURCE: &str = "dashboards";
pub const DASHBOARD_KIND: &str = "Dashboard";

/// Returns the registered dashboard resource type.
pub fn dashboard_resource_type() -> ResourceType {
    ResourceType::new(
        GroupVersionResource::new(DASHBOARD_GROUP, DASHBOARD_VERSION, DASHBOARD_RESOURCE),
        DASHBOARD_KIND,
    )
}

/// Builds an unnamed dashboard object with only `spec.title` set.
pub fn new_dashboard(title: impl Into<String>) -> ResourceObject {
    ResourceObject::new(
        &dashboard_resource_type(),
        json!({ "title": title.into() }),
    )
}

/// Dashboards require a non-empty `spec.title`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardValidator;

impl ResourceValidator for DashboardValidator {
    fn validate(&self, obj: &ResourceObject) -> Result<(), ValidationError> {
        let title = obj.spec_str("title")?;
        if title.trim().is_empty() {
            return Err(ValidationError::invalid("spec.title", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{dashboard_resource_type, new_dashboard, DashboardValidator};
    use crate::model::object::ResourceObject;
    use crate::validation::ResourceValidator;
    use serde_json::json;

    #[test]
    fn title_is_required_non_empty_string() {
        let validator = DashboardValidator;
        validator.validate(&new_dashboard("Ops")).unwrap();

        let blank = new_dashboard("   ");
        assert_eq!(validator.validate(&blank).unwrap_err().field, "spec.title");

        let missing = ResourceObject::new(&dashboard_resource_type(), json!({ "panels": [] }));
        assert_eq!(validator.validate(&missing).unwrap_err().reason, "required");

        let numeric = ResourceObject::new(&dashboard_resource_type(), json!({ "title": 3 }));
        assert!(validator
            .validate(&numeric)
            .unwrap_err()
            .reason
            .contains("expected string"));
    }

    #[test]
    fn unknown_fields_do_not_fail_validation() {
        let obj = ResourceObject::new(
            &dashboard_resource_type(),
            json!({ "title": "Ops", "schemaVersion": 39, "panels": [] }),
        );
        DashboardValidator.validate(&obj).unwrap();
    }
}
