//! Resource API server: request dispatch over registered collections.
//!
//! # Responsibility
//! - Resolve group/version/resource descriptors to stores.
//! - Honor caller cancellation up to the point a store is invoked.
//! - Emit one metadata-only log event per request.
//!
//! # Invariants
//! - Dispatch holds no business logic; stores own validation and identity.
//! - The registry is fixed once the server is constructed.

use crate::config::{ConfigError, ServerConfig, StorageConfig};
use crate::dashboard::{dashboard_resource_type, DashboardValidator};
use crate::db::{open_db, open_db_in_memory};
use crate::model::object::{GroupVersionResource, ResourceList, ResourceObject, ResourceType};
use crate::names::NameGenerator;
use crate::store::memory::MemoryResourceStore;
use crate::store::sqlite::SqliteResourceStore;
use crate::store::{ListOptions, ResourceStore, StoreResult};
use crate::validation::ResourceValidator;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

pub mod context;
pub mod error;
pub mod registry;

use context::RequestContext;
use error::{ApiError, ApiResult};
use registry::ResourceRegistry;

/// Thin dispatcher from typed requests to per-collection stores.
#[derive(Clone)]
pub struct ResourceApiServer {
    registry: Arc<ResourceRegistry>,
}

impl ResourceApiServer {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }

    /// Builds a server serving dashboards on the configured storage backend.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let names = NameGenerator::new(config.name_generation.max_attempts);
        let store = build_store(
            &config.storage,
            dashboard_resource_type(),
            Arc::new(DashboardValidator),
            names,
        )?;

        let mut registry = ResourceRegistry::new();
        registry.register(store)?;
        info!(
            "event=server_init module=server status=ok storage={} resources={}",
            config.storage.kind(),
            registry.len()
        );
        Ok(Self::new(Arc::new(registry)))
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn list(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        options: &ListOptions,
    ) -> ApiResult<ResourceList> {
        self.dispatch(ctx, gvr, "list", "", |store| store.list(options))
    }

    pub fn create(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        obj: &ResourceObject,
    ) -> ApiResult<ResourceObject> {
        let target = if obj.metadata.name.is_empty() {
            obj.metadata.generate_name.as_deref().unwrap_or_default()
        } else {
            obj.metadata.name.as_str()
        };
        self.dispatch(ctx, gvr, "create", target, |store| store.create(obj))
    }

    pub fn get(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        name: &str,
    ) -> ApiResult<ResourceObject> {
        self.dispatch(ctx, gvr, "get", name, |store| store.get(name))
    }

    pub fn update(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        obj: &ResourceObject,
    ) -> ApiResult<ResourceObject> {
        self.dispatch(ctx, gvr, "update", obj.name(), |store| store.update(obj))
    }

    pub fn delete(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        name: &str,
    ) -> ApiResult<()> {
        self.dispatch(ctx, gvr, "delete", name, |store| store.delete(name))
    }

    fn dispatch<T>(
        &self,
        ctx: &RequestContext,
        gvr: &GroupVersionResource,
        verb: &str,
        target: &str,
        op: impl FnOnce(&dyn ResourceStore) -> StoreResult<T>,
    ) -> ApiResult<T> {
        let started_at = Instant::now();
        let caller = ctx.caller().subject.as_str();

        let store = self
            .registry
            .resolve(gvr)
            .ok_or_else(|| ApiError::ResourceNotRegistered(gvr.clone()));
        let result = store.and_then(|store| {
            if ctx.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            op(store.as_ref()).map_err(|source| ApiError::Store {
                gvr: gvr.clone(),
                source,
            })
        });

        match &result {
            Ok(_) => info!(
                "event=resource_{verb} module=server status=ok gvr={gvr} name={target} caller={caller} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=resource_{verb} module=server status=error gvr={gvr} name={target} caller={caller} duration_ms={} error_code={} error={err}",
                started_at.elapsed().as_millis(),
                err.reason()
            ),
        }
        result
    }
}

fn build_store(
    storage: &StorageConfig,
    resource_type: ResourceType,
    validator: Arc<dyn ResourceValidator>,
    names: NameGenerator,
) -> Result<Arc<dyn ResourceStore>, ConfigError> {
    let store: Arc<dyn ResourceStore> = match storage {
        StorageConfig::Memory => Arc::new(
            MemoryResourceStore::new(resource_type, validator).with_name_generator(names),
        ),
        StorageConfig::Sqlite { path } => {
            let conn = if path.as_os_str() == ":memory:" {
                open_db_in_memory()?
            } else {
                open_db(path)?
            };
            Arc::new(
                SqliteResourceStore::new(conn, resource_type, validator)?
                    .with_name_generator(names),
            )
        }
    };
    Ok(store)
}
