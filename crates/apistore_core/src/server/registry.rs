//! Startup-time registry mapping group/version/resource to stores.

use crate::model::object::GroupVersionResource;
use crate::store::ResourceStore;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidResource(GroupVersionResource),
    DuplicateResource(GroupVersionResource),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidResource(gvr) => write!(f, "resource descriptor is invalid: {gvr}"),
            Self::DuplicateResource(gvr) => write!(f, "resource already registered: {gvr}"),
        }
    }
}

impl Error for RegistryError {}

/// Collections served by one API server.
///
/// Built once at startup, then shared read-only.
#[derive(Default)]
pub struct ResourceRegistry {
    stores: BTreeMap<GroupVersionResource, Arc<dyn ResourceStore>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one store under its resource type's GVR.
    pub fn register(&mut self, store: Arc<dyn ResourceStore>) -> Result<(), RegistryError> {
        let resource_type = store.resource_type();
        let gvr = resource_type.gvr.clone();
        if !is_valid_segment(&gvr.version)
            || !is_valid_segment(&gvr.resource)
            || !(gvr.group.is_empty() || is_valid_group(&gvr.group))
            || resource_type.kind.trim().is_empty()
        {
            return Err(RegistryError::InvalidResource(gvr));
        }
        if self.stores.contains_key(&gvr) {
            return Err(RegistryError::DuplicateResource(gvr));
        }

        self.stores.insert(gvr, store);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Returns registered descriptors in sorted order.
    pub fn resources(&self) -> Vec<GroupVersionResource> {
        self.stores.keys().cloned().collect()
    }

    pub fn resolve(&self, gvr: &GroupVersionResource) -> Option<Arc<dyn ResourceStore>> {
        self.stores.get(gvr).cloned()
    }
}

fn is_valid_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_group(value: &str) -> bool {
    value.split('.').all(is_valid_segment)
}

#[cfg(test)]
mod tests {
    use super::{RegistryError, ResourceRegistry};
    use crate::dashboard::{dashboard_resource_type, DashboardValidator};
    use crate::model::object::{GroupVersionResource, ResourceType};
    use crate::store::memory::MemoryResourceStore;
    use crate::validation::AcceptAnySpec;
    use std::sync::Arc;

    #[test]
    fn register_rejects_duplicate_gvr() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(Arc::new(MemoryResourceStore::new(
                dashboard_resource_type(),
                Arc::new(DashboardValidator),
            )))
            .unwrap();

        let err = registry
            .register(Arc::new(MemoryResourceStore::new(
                dashboard_resource_type(),
                Arc::new(DashboardValidator),
            )))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateResource(dashboard_resource_type().gvr)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_malformed_descriptor() {
        let mut registry = ResourceRegistry::new();
        let bad = ResourceType::new(GroupVersionResource::new("Bad Group", "v1", "things"), "Thing");
        let err = registry
            .register(Arc::new(MemoryResourceStore::new(bad, Arc::new(AcceptAnySpec))))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidResource(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn core_group_and_lookup() {
        let mut registry = ResourceRegistry::new();
        let config_maps =
            ResourceType::new(GroupVersionResource::new("", "v1", "configmaps"), "ConfigMap");
        registry
            .register(Arc::new(MemoryResourceStore::new(
                config_maps.clone(),
                Arc::new(AcceptAnySpec),
            )))
            .unwrap();

        assert!(registry.resolve(&config_maps.gvr).is_some());
        assert!(registry
            .resolve(&GroupVersionResource::new("", "v2", "configmaps"))
            .is_none());
        assert_eq!(registry.resources(), vec![config_maps.gvr]);
    }
}
