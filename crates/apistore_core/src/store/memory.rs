//! In-memory resource store.
//!
//! # Responsibility
//! - Hold one collection in process memory behind a reader/writer lock.
//!
//! # Invariants
//! - Mutations run under the write guard; readers share the read guard and
//!   always observe a completed prefix of the mutation history.
//! - `by_name` and `objects` are updated together under the same guard.
//! - Insertion order is preserved by a monotonic sequence key; updates keep
//!   the original position.

use crate::model::object::{ResourceList, ResourceObject, ResourceType, ResourceVersion};
use crate::names::NameGenerator;
use crate::store::{
    admit_create, admit_update, check_expected_version, stamp_created, stamp_updated, ListOptions,
    ResourceStore, StoreError, StoreResult,
};
use crate::validation::ResourceValidator;
use chrono::Utc;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Collection {
    resource_version: ResourceVersion,
    next_seq: u64,
    objects: BTreeMap<u64, ResourceObject>,
    by_name: HashMap<String, u64>,
}

impl Collection {
    fn get(&self, name: &str) -> Option<&ResourceObject> {
        self.by_name
            .get(name)
            .and_then(|seq| self.objects.get(seq))
    }

    fn advance(&mut self) -> ResourceVersion {
        self.resource_version = self.resource_version.next();
        self.resource_version
    }
}

/// Process-local store for one collection.
pub struct MemoryResourceStore {
    resource_type: ResourceType,
    validator: Arc<dyn ResourceValidator>,
    names: NameGenerator,
    state: RwLock<Collection>,
}

impl MemoryResourceStore {
    pub fn new(resource_type: ResourceType, validator: Arc<dyn ResourceValidator>) -> Self {
        Self {
            resource_type,
            validator,
            names: NameGenerator::default(),
            state: RwLock::new(Collection::default()),
        }
    }

    pub fn with_name_generator(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collection>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collection>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ResourceStore for MemoryResourceStore {
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    fn create(&self, obj: &ResourceObject) -> StoreResult<ResourceObject> {
        let mut created = admit_create(&self.resource_type, self.validator.as_ref(), obj)?;

        let mut state = self.write()?;
        let name = if created.metadata.name.is_empty() {
            let prefix = created.metadata.generate_name.as_deref().unwrap_or_default();
            let generated = self
                .names
                .generate(prefix, |candidate| state.by_name.contains_key(candidate))?;
            debug!(
                "event=name_generate module=store status=ok gvr={} prefix={} name={}",
                self.resource_type.gvr, prefix, generated
            );
            generated
        } else if state.by_name.contains_key(created.metadata.name.as_str()) {
            return Err(StoreError::AlreadyExists {
                name: created.metadata.name.clone(),
            });
        } else {
            created.metadata.name.clone()
        };

        let resource_version = state.advance();
        stamp_created(&mut created, name.clone(), resource_version, Utc::now());

        let seq = state.next_seq;
        state.next_seq += 1;
        state.objects.insert(seq, created.clone());
        state.by_name.insert(name, seq);
        Ok(created)
    }

    fn get(&self, name: &str) -> StoreResult<ResourceObject> {
        let state = self.read()?;
        state.get(name).cloned().ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })
    }

    fn list(&self, options: &ListOptions) -> StoreResult<ResourceList> {
        let state = self.read()?;
        let limit = options.limit.map_or(usize::MAX, |limit| limit as usize);
        let items = state
            .objects
            .values()
            .filter(|obj| options.matches(obj.name()))
            .take(limit)
            .cloned()
            .collect();
        Ok(ResourceList::new(
            &self.resource_type,
            state.resource_version,
            items,
        ))
    }

    fn update(&self, obj: &ResourceObject) -> StoreResult<ResourceObject> {
        let (mut updated, expected) =
            admit_update(&self.resource_type, self.validator.as_ref(), obj)?;

        let mut state = self.write()?;
        let name = updated.metadata.name.clone();
        let seq = *state
            .by_name
            .get(name.as_str())
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        let current = state
            .objects
            .get(&seq)
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        let current_version = current.resource_version()?.unwrap_or_default();
        check_expected_version(&name, expected, current_version)?;
        let current = current.clone();

        let resource_version = state.advance();
        stamp_updated(&mut updated, &current, resource_version);
        state.objects.insert(seq, updated.clone());
        Ok(updated)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        let seq = state.by_name.remove(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;
        state.objects.remove(&seq);
        state.advance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryResourceStore;
    use crate::dashboard::{dashboard_resource_type, new_dashboard, DashboardValidator};
    use crate::store::{ListOptions, ResourceStore, StoreError};
    use std::sync::Arc;

    fn store() -> MemoryResourceStore {
        MemoryResourceStore::new(dashboard_resource_type(), Arc::new(DashboardValidator))
    }

    #[test]
    fn list_preserves_insertion_order_across_updates() {
        let store = store();
        for name in ["c", "a", "b"] {
            store.create(&new_dashboard(name).with_name(name)).unwrap();
        }

        let mut first = store.get("c").unwrap();
        first.spec["title"] = "renamed".into();
        store.update(&first).unwrap();

        let list = store.list(&ListOptions::default()).unwrap();
        assert_eq!(list.names(), vec!["c", "a", "b"]);
        assert_eq!(list.metadata.resource_version, "4");
    }

    #[test]
    fn delete_frees_name_for_reuse() {
        let store = store();
        let first = store.create(&new_dashboard("one").with_name("dup")).unwrap();
        store.delete("dup").unwrap();

        let second = store.create(&new_dashboard("two").with_name("dup")).unwrap();
        assert_ne!(first.metadata.uid, second.metadata.uid);
        assert!(matches!(
            store.delete("missing"),
            Err(StoreError::NotFound { name }) if name == "missing"
        ));
    }

    #[test]
    fn list_options_filter_and_limit() {
        let store = store();
        for name in ["team-a", "team-b", "other", "team-c"] {
            store.create(&new_dashboard(name).with_name(name)).unwrap();
        }

        let options = ListOptions {
            name_prefix: Some("team-".to_string()),
            limit: Some(2),
        };
        let list = store.list(&options).unwrap();
        assert_eq!(list.names(), vec!["team-a", "team-b"]);
    }
}
