//! SQLite-backed resource store.
//!
//! # Responsibility
//! - Persist one collection in the `resources` table, partitioned by GVR.
//! - Keep the collection resource-version counter in `collections`.
//!
//! # Invariants
//! - Every mutation runs in one `IMMEDIATE` transaction that bumps the
//!   collection counter and writes the object row together.
//! - Reads run in a transaction so the counter and rows come from one snapshot.
//! - Read paths reject undecodable rows instead of masking them.

use crate::db::{DbError, DbResult};
use crate::model::object::{
    GroupVersionResource, ObjectMeta, ResourceList, ResourceObject, ResourceType, ResourceVersion,
};
use crate::names::NameGenerator;
use crate::store::{
    admit_create, admit_update, check_expected_version, stamp_created, stamp_updated, ListOptions,
    ResourceStore, StoreError, StoreResult,
};
use crate::validation::ResourceValidator;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const RESOURCE_SELECT_SQL: &str = "SELECT
    name,
    uid,
    generate_name,
    resource_version,
    creation_timestamp,
    spec
FROM resources
WHERE api_group = ?1 AND api_version = ?2 AND resource = ?3";

/// Store persisting one collection through a dedicated SQLite connection.
pub struct SqliteResourceStore {
    resource_type: ResourceType,
    validator: Arc<dyn ResourceValidator>,
    names: NameGenerator,
    conn: Mutex<Connection>,
}

impl SqliteResourceStore {
    /// Wraps a migrated connection and registers the collection row.
    ///
    /// Use `db::open_db` or `db::open_db_in_memory` to obtain `conn`.
    pub fn new(
        conn: Connection,
        resource_type: ResourceType,
        validator: Arc<dyn ResourceValidator>,
    ) -> StoreResult<Self> {
        ensure_collection(&conn, &resource_type.gvr)?;
        Ok(Self {
            resource_type,
            validator,
            names: NameGenerator::default(),
            conn: Mutex::new(conn),
        })
    }

    pub fn with_name_generator(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn gvr(&self) -> &GroupVersionResource {
        &self.resource_type.gvr
    }

    fn resolve_name(&self, tx: &Transaction<'_>, obj: &ResourceObject) -> StoreResult<String> {
        if !obj.metadata.name.is_empty() {
            if find_object(tx, &self.resource_type, &obj.metadata.name)?.is_some() {
                return Err(StoreError::AlreadyExists {
                    name: obj.metadata.name.clone(),
                });
            }
            return Ok(obj.metadata.name.clone());
        }

        let prefix = obj.metadata.generate_name.as_deref().unwrap_or_default();
        let generated = self
            .names
            .try_generate(prefix, |candidate| name_exists(tx, self.gvr(), candidate))?;
        debug!(
            "event=name_generate module=store status=ok gvr={} prefix={} name={}",
            self.gvr(),
            prefix,
            generated
        );
        Ok(generated)
    }
}

impl ResourceStore for SqliteResourceStore {
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    fn create(&self, obj: &ResourceObject) -> StoreResult<ResourceObject> {
        let mut created = admit_create(&self.resource_type, self.validator.as_ref(), obj)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let name = self.resolve_name(&tx, &created)?;
        let resource_version = advance_collection(&tx, self.gvr())?;
        stamp_created(&mut created, name, resource_version, Utc::now());
        insert_object(&tx, self.gvr(), &created, resource_version)?;
        tx.commit()?;
        Ok(created)
    }

    fn get(&self, name: &str) -> StoreResult<ResourceObject> {
        let conn = self.lock()?;
        find_object(&conn, &self.resource_type, name)?.ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })
    }

    fn list(&self, options: &ListOptions) -> StoreResult<ResourceList> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let resource_version = collection_version(&tx, self.gvr())?;

        let gvr = self.gvr();
        let mut sql = RESOURCE_SELECT_SQL.to_string();
        let mut bind_values = vec![
            Value::Text(gvr.group.clone()),
            Value::Text(gvr.version.clone()),
            Value::Text(gvr.resource.clone()),
        ];
        if let Some(prefix) = options.name_prefix.as_deref() {
            sql.push_str(" AND substr(name, 1, length(?4)) = ?4");
            bind_values.push(Value::Text(prefix.to_string()));
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT ?{}", bind_values.len() + 1));
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut items = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            while let Some(row) = rows.next()? {
                items.push(parse_object_row(row, &self.resource_type)?);
            }
        }
        tx.commit()?;

        Ok(ResourceList::new(
            &self.resource_type,
            resource_version,
            items,
        ))
    }

    fn update(&self, obj: &ResourceObject) -> StoreResult<ResourceObject> {
        let (mut updated, expected) =
            admit_update(&self.resource_type, self.validator.as_ref(), obj)?;
        let name = updated.metadata.name.clone();

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = find_object(&tx, &self.resource_type, &name)?
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        let current_version = current.resource_version()?.unwrap_or_default();
        check_expected_version(&name, expected, current_version)?;

        let resource_version = advance_collection(&tx, self.gvr())?;
        stamp_updated(&mut updated, &current, resource_version);
        let gvr = self.gvr();
        tx.execute(
            "UPDATE resources
             SET resource_version = ?1, spec = ?2
             WHERE api_group = ?3 AND api_version = ?4 AND resource = ?5 AND name = ?6;",
            params![
                version_to_db(resource_version)?,
                encode_spec(&updated)?,
                gvr.group,
                gvr.version,
                gvr.resource,
                name,
            ],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let gvr = self.gvr();
        let changed = tx.execute(
            "DELETE FROM resources
             WHERE api_group = ?1 AND api_version = ?2 AND resource = ?3 AND name = ?4;",
            params![gvr.group, gvr.version, gvr.resource, name],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        advance_collection(&tx, gvr)?;
        tx.commit()?;
        Ok(())
    }
}

fn ensure_collection(conn: &Connection, gvr: &GroupVersionResource) -> DbResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO collections (api_group, api_version, resource, resource_version)
         VALUES (?1, ?2, ?3, 0);",
        params![gvr.group, gvr.version, gvr.resource],
    )?;
    Ok(())
}

fn collection_version(
    conn: &Connection,
    gvr: &GroupVersionResource,
) -> StoreResult<ResourceVersion> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT resource_version FROM collections
             WHERE api_group = ?1 AND api_version = ?2 AND resource = ?3;",
            params![gvr.group, gvr.version, gvr.resource],
            |row| row.get(0),
        )
        .optional()?;
    version_from_db(value.ok_or_else(|| missing_collection(gvr))?)
}

fn advance_collection(
    tx: &Transaction<'_>,
    gvr: &GroupVersionResource,
) -> StoreResult<ResourceVersion> {
    let value: Option<i64> = tx
        .query_row(
            "UPDATE collections
             SET resource_version = resource_version + 1
             WHERE api_group = ?1 AND api_version = ?2 AND resource = ?3
             RETURNING resource_version;",
            params![gvr.group, gvr.version, gvr.resource],
            |row| row.get(0),
        )
        .optional()?;
    version_from_db(value.ok_or_else(|| missing_collection(gvr))?)
}

fn missing_collection(gvr: &GroupVersionResource) -> DbError {
    DbError::MissingCollection {
        collection: gvr.to_string(),
    }
}

fn insert_object(
    tx: &Transaction<'_>,
    gvr: &GroupVersionResource,
    obj: &ResourceObject,
    resource_version: ResourceVersion,
) -> StoreResult<()> {
    let uid = obj
        .metadata
        .uid
        .ok_or_else(|| StoreError::InvalidData("created object has no uid".to_string()))?;
    let creation_timestamp = obj.metadata.creation_timestamp.ok_or_else(|| {
        StoreError::InvalidData("created object has no creationTimestamp".to_string())
    })?;

    tx.execute(
        "INSERT INTO resources (
            api_group,
            api_version,
            resource,
            name,
            uid,
            generate_name,
            resource_version,
            creation_timestamp,
            spec
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            gvr.group,
            gvr.version,
            gvr.resource,
            obj.metadata.name,
            uid.to_string(),
            obj.metadata.generate_name.as_deref(),
            version_to_db(resource_version)?,
            creation_timestamp.to_rfc3339(),
            encode_spec(obj)?,
        ],
    )?;
    Ok(())
}

fn find_object(
    conn: &Connection,
    resource_type: &ResourceType,
    name: &str,
) -> StoreResult<Option<ResourceObject>> {
    let gvr = &resource_type.gvr;
    let mut stmt = conn.prepare(&format!("{RESOURCE_SELECT_SQL} AND name = ?4;"))?;
    let mut rows = stmt.query(params![gvr.group, gvr.version, gvr.resource, name])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_object_row(row, resource_type)?)),
        None => Ok(None),
    }
}

fn name_exists(conn: &Connection, gvr: &GroupVersionResource, name: &str) -> StoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM resources
            WHERE api_group = ?1 AND api_version = ?2 AND resource = ?3 AND name = ?4
        );",
        params![gvr.group, gvr.version, gvr.resource, name],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn parse_object_row(row: &Row<'_>, resource_type: &ResourceType) -> StoreResult<ResourceObject> {
    let name: String = row.get("name")?;

    let uid_text: String = row.get("uid")?;
    let uid = Uuid::parse_str(&uid_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uid `{uid_text}` for object `{name}`"))
    })?;

    let timestamp_text: String = row.get("creation_timestamp")?;
    let creation_timestamp = DateTime::parse_from_rfc3339(&timestamp_text)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid creation_timestamp `{timestamp_text}` for object `{name}`"
            ))
        })?;

    let spec_text: String = row.get("spec")?;
    let spec = serde_json::from_str(&spec_text).map_err(|err| {
        StoreError::InvalidData(format!("invalid spec json for object `{name}`: {err}"))
    })?;

    let resource_version = version_from_db(row.get("resource_version")?)?;

    Ok(ResourceObject {
        api_version: resource_type.api_version(),
        kind: resource_type.kind.clone(),
        metadata: ObjectMeta {
            name,
            generate_name: row.get("generate_name")?,
            resource_version: resource_version.to_string(),
            uid: Some(uid),
            creation_timestamp: Some(creation_timestamp),
        },
        spec,
    })
}

fn encode_spec(obj: &ResourceObject) -> StoreResult<String> {
    serde_json::to_string(&obj.spec).map_err(|err| {
        StoreError::InvalidData(format!(
            "spec of object `{}` is not serializable: {err}",
            obj.metadata.name
        ))
    })
}

fn version_to_db(version: ResourceVersion) -> StoreResult<i64> {
    i64::try_from(version.0)
        .map_err(|_| StoreError::InvalidData(format!("resource version {version} overflows")))
}

fn version_from_db(value: i64) -> StoreResult<ResourceVersion> {
    u64::try_from(value)
        .map(ResourceVersion)
        .map_err(|_| StoreError::InvalidData(format!("negative resource version {value}")))
}
