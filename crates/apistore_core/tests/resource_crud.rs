use apistore_core::db::open_db_in_memory;
use apistore_core::{
    dashboard_resource_type, new_dashboard, DashboardValidator, ListOptions,
    MemoryResourceStore, NameGenerator, ResourceObject, ResourceStore, SqliteResourceStore,
    StoreError,
};
use serde_json::json;
use std::sync::Arc;

fn memory_store(names: NameGenerator) -> Box<dyn ResourceStore> {
    Box::new(
        MemoryResourceStore::new(dashboard_resource_type(), Arc::new(DashboardValidator))
            .with_name_generator(names),
    )
}

fn sqlite_store(names: NameGenerator) -> Box<dyn ResourceStore> {
    Box::new(
        SqliteResourceStore::new(
            open_db_in_memory().unwrap(),
            dashboard_resource_type(),
            Arc::new(DashboardValidator),
        )
        .unwrap()
        .with_name_generator(names),
    )
}

fn backends() -> Vec<(&'static str, Box<dyn ResourceStore>)> {
    backends_with(NameGenerator::default())
}

fn backends_with(names: NameGenerator) -> Vec<(&'static str, Box<dyn ResourceStore>)> {
    vec![("memory", memory_store(names)), ("sqlite", sqlite_store(names))]
}

#[test]
fn dashboard_lifecycle_scenario() {
    for (backend, store) in backends() {
        let empty = store.list(&ListOptions::default()).unwrap();
        assert!(empty.items.is_empty(), "{backend}");
        assert_eq!(empty.kind, "DashboardList");

        let created = store
            .create(&new_dashboard("Test dashboard").with_generate_name("test-"))
            .unwrap();
        let name = created.metadata.name.clone();
        assert!(name.starts_with("test-"), "{backend}: {name}");
        assert!(name.len() > "test-".len(), "{backend}");
        assert_eq!(created.spec_str("title").unwrap(), "Test dashboard");

        let fetched = store.get(&name).unwrap();
        assert_eq!(fetched.spec_str("title").unwrap(), "Test dashboard");
        assert_eq!(fetched, created, "{backend}");

        let listed = store.list(&ListOptions::default()).unwrap();
        assert_eq!(listed.names(), vec![name.as_str()], "{backend}");

        store.delete(&name).unwrap();
        assert!(matches!(
            store.get(&name),
            Err(StoreError::NotFound { name: missing }) if missing == name
        ));
        assert!(store
            .list(&ListOptions::default())
            .unwrap()
            .items
            .is_empty());
    }
}

#[test]
fn create_assigns_server_identity_and_type_fields() {
    for (backend, store) in backends() {
        let mut input = new_dashboard("Ops").with_name("ops");
        input.api_version.clear();
        input.kind.clear();
        input.metadata.resource_version = "999".to_string();

        let created = store.create(&input).unwrap();
        assert_eq!(created.api_version, "dashboard.grafana.app/v1alpha1", "{backend}");
        assert_eq!(created.kind, "Dashboard");
        assert_eq!(created.metadata.resource_version, "1", "{backend}");
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
    }
}

#[test]
fn create_with_existing_name_fails_and_keeps_original() {
    for (backend, store) in backends() {
        let original = store.create(&new_dashboard("First").with_name("same")).unwrap();

        let err = store
            .create(&new_dashboard("Second").with_name("same"))
            .unwrap_err();
        assert!(
            matches!(&err, StoreError::AlreadyExists { name } if name == "same"),
            "{backend}: {err}"
        );

        let stored = store.get("same").unwrap();
        assert_eq!(stored, original, "{backend}");
        assert_eq!(store.list(&ListOptions::default()).unwrap().items.len(), 1);
    }
}

#[test]
fn explicit_name_takes_precedence_over_generate_name() {
    for (backend, store) in backends() {
        let created = store
            .create(
                &new_dashboard("Both")
                    .with_name("explicit")
                    .with_generate_name("gen-"),
            )
            .unwrap();
        assert_eq!(created.metadata.name, "explicit", "{backend}");
        assert_eq!(created.metadata.generate_name.as_deref(), Some("gen-"));
    }
}

#[test]
fn invalid_objects_never_reach_the_store() {
    for (backend, store) in backends() {
        let untitled = ResourceObject::new(&dashboard_resource_type(), json!({ "panels": [] }))
            .with_generate_name("x-");
        let err = store.create(&untitled).unwrap_err();
        match err {
            StoreError::Invalid(validation) => assert_eq!(validation.field, "spec.title"),
            other => panic!("{backend}: unexpected error {other}"),
        }

        let nameless = new_dashboard("No name");
        assert!(matches!(
            store.create(&nameless),
            Err(StoreError::Invalid(validation)) if validation.field == "metadata.name"
        ));

        let list = store.list(&ListOptions::default()).unwrap();
        assert!(list.items.is_empty(), "{backend}");
        assert_eq!(list.metadata.resource_version, "0", "{backend}");
    }
}

#[test]
fn unknown_spec_fields_are_preserved() {
    for (backend, store) in backends() {
        let obj = ResourceObject::new(
            &dashboard_resource_type(),
            json!({ "title": "Rich", "panels": [{ "id": 1, "type": "graph" }], "refresh": "5s" }),
        )
        .with_name("rich");

        store.create(&obj).unwrap();
        let fetched = store.get("rich").unwrap();
        assert_eq!(fetched.spec, obj.spec, "{backend}");
    }
}

#[test]
fn resource_version_strictly_increases_across_mutations() {
    for (backend, store) in backends() {
        let a = store.create(&new_dashboard("a").with_name("a")).unwrap();
        let b = store.create(&new_dashboard("b").with_name("b")).unwrap();
        store.delete("a").unwrap();
        let after_delete = store.list(&ListOptions::default()).unwrap();
        let c = store.create(&new_dashboard("c").with_name("c")).unwrap();

        let versions: Vec<u64> = [
            a.metadata.resource_version.as_str(),
            b.metadata.resource_version.as_str(),
            after_delete.metadata.resource_version.as_str(),
            c.metadata.resource_version.as_str(),
        ]
        .iter()
        .map(|value| value.parse().unwrap())
        .collect();
        assert_eq!(versions, vec![1, 2, 3, 4], "{backend}");
    }
}

#[test]
fn delete_twice_reports_not_found() {
    for (backend, store) in backends() {
        store.create(&new_dashboard("gone").with_name("gone")).unwrap();
        store.delete("gone").unwrap();

        let err = store.delete("gone").unwrap_err();
        assert!(
            matches!(&err, StoreError::NotFound { name } if name == "gone"),
            "{backend}: {err}"
        );
    }
}

#[test]
fn update_replaces_spec_and_checks_resource_version() {
    for (backend, store) in backends() {
        let created = store.create(&new_dashboard("v1").with_name("dash")).unwrap();

        let mut edit = created.clone();
        edit.spec = json!({ "title": "v2" });
        let updated = store.update(&edit).unwrap();
        assert_eq!(updated.spec_str("title").unwrap(), "v2", "{backend}");
        assert_eq!(updated.metadata.uid, created.metadata.uid);
        assert_eq!(
            updated.metadata.creation_timestamp,
            created.metadata.creation_timestamp
        );
        assert_eq!(updated.metadata.resource_version, "2", "{backend}");
        assert_eq!(store.get("dash").unwrap(), updated, "{backend}");

        // `edit` still carries resource version 1.
        edit.spec = json!({ "title": "v3" });
        match store.update(&edit).unwrap_err() {
            StoreError::Conflict {
                name,
                expected,
                actual,
            } => {
                assert_eq!(name, "dash");
                assert_eq!(expected, "1");
                assert_eq!(actual, "2");
            }
            other => panic!("{backend}: unexpected error {other}"),
        }

        let mut unconditional = new_dashboard("v4").with_name("dash");
        unconditional.metadata.resource_version.clear();
        store.update(&unconditional).unwrap();

        let missing = new_dashboard("x").with_name("missing");
        assert!(matches!(
            store.update(&missing),
            Err(StoreError::NotFound { .. })
        ));

        let mut invalid = store.get("dash").unwrap();
        invalid.spec = json!({ "title": "" });
        assert!(matches!(store.update(&invalid), Err(StoreError::Invalid(_))));
        assert_eq!(
            store.get("dash").unwrap().spec_str("title").unwrap(),
            "v4",
            "{backend}"
        );
    }
}

#[test]
fn occupied_candidates_exhaust_name_generation_without_side_effects() {
    let names = NameGenerator::new(1).with_seed(7);
    let occupied = names.generate("p-", |_| false).unwrap();

    for (backend, store) in backends_with(names) {
        store
            .create(&new_dashboard("squatter").with_name(occupied.as_str()))
            .unwrap();

        let err = store
            .create(&new_dashboard("generated").with_generate_name("p-"))
            .unwrap_err();
        assert!(
            matches!(
                &err,
                StoreError::NameGenerationExhausted(inner) if inner.prefix == "p-" && inner.attempts == 1
            ),
            "{backend}: {err}"
        );

        let list = store.list(&ListOptions::default()).unwrap();
        assert_eq!(list.names(), vec![occupied.as_str()], "{backend}");
        assert_eq!(list.metadata.resource_version, "1", "{backend}");
    }
}

#[test]
fn generation_retries_past_an_occupied_candidate() {
    let names = NameGenerator::new(2).with_seed(7);
    let occupied = NameGenerator::new(1)
        .with_seed(7)
        .generate("p-", |_| false)
        .unwrap();

    for (backend, store) in backends_with(names) {
        store
            .create(&new_dashboard("squatter").with_name(occupied.as_str()))
            .unwrap();

        let created = store
            .create(&new_dashboard("generated").with_generate_name("p-"))
            .unwrap();
        assert_ne!(created.metadata.name, occupied, "{backend}");
        assert!(created.metadata.name.starts_with("p-"), "{backend}");
    }
}

#[test]
fn long_generate_name_collisions_are_retried_not_stored() {
    let prefix = format!("{}-", "p".repeat(59));
    let names = NameGenerator::new(1).with_seed(11);

    for (backend, store) in backends_with(names) {
        let first = store
            .create(&new_dashboard("first").with_generate_name(prefix.as_str()))
            .unwrap();
        assert_eq!(first.metadata.name.len(), 63, "{backend}");

        // Same seed, same candidate: the truncated name is already taken.
        let err = store
            .create(&new_dashboard("second").with_generate_name(prefix.as_str()))
            .unwrap_err();
        assert!(
            matches!(err, StoreError::NameGenerationExhausted(_)),
            "{backend}: {err}"
        );
        assert_eq!(store.list(&ListOptions::default()).unwrap().items.len(), 1);
    }
}

#[test]
fn malformed_generate_name_is_rejected_before_naming() {
    for (backend, store) in backends() {
        for prefix in ["a..", "a.-", "a-."] {
            let err = store
                .create(&new_dashboard("x").with_generate_name(prefix))
                .unwrap_err();
            assert!(
                matches!(&err, StoreError::Invalid(validation) if validation.field == "metadata.generateName"),
                "{backend}: {prefix}: {err}"
            );
        }
        let list = store.list(&ListOptions::default()).unwrap();
        assert!(list.items.is_empty(), "{backend}");
        assert_eq!(list.metadata.resource_version, "0", "{backend}");
    }
}

#[test]
fn generated_names_can_be_updated() {
    for (backend, store) in backends() {
        for prefix in ["web.", "test-", "a"] {
            let created = store
                .create(&new_dashboard("before").with_generate_name(prefix))
                .unwrap();

            let mut edit = created.clone();
            edit.spec = json!({ "title": "after" });
            let updated = store.update(&edit).unwrap();
            assert_eq!(updated.metadata.name, created.metadata.name, "{backend}");
            assert_eq!(updated.spec_str("title").unwrap(), "after", "{backend}");
        }
    }
}
