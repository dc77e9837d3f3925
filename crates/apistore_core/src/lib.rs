//! Core domain logic for the apistore resource API server.
//! This crate owns object identity, validation and storage invariants.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod logging;
pub mod model;
pub mod names;
pub mod server;
pub mod store;
pub mod validation;

pub use config::{ConfigError, LoggingConfig, NameGenerationConfig, ServerConfig, StorageConfig};
pub use dashboard::{dashboard_resource_type, new_dashboard, DashboardValidator};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::object::{
    GroupVersionResource, ListMeta, ObjectMeta, ResourceList, ResourceObject, ResourceType,
    ResourceVersion,
};
pub use names::{NameGenerationError, NameGenerator};
pub use server::context::{CallerIdentity, CancelHandle, RequestContext};
pub use server::error::{ApiError, ApiResult, ErrorReason};
pub use server::registry::{RegistryError, ResourceRegistry};
pub use server::ResourceApiServer;
pub use store::memory::MemoryResourceStore;
pub use store::sqlite::SqliteResourceStore;
pub use store::{ListOptions, ResourceStore, StoreError, StoreResult};
pub use validation::{AcceptAnySpec, ResourceValidator, ValidationError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
