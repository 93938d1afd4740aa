/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! SQLite inventory store
//!
//! One table per entity kind, generated from the record's scalar fields. Child
//! collections (nics, disks, psus, fans) live in their own tables and point back
//! to their owner through the `*_serial` columns.

use crate::domain::records::{to_map, Record};
use crate::domain::{
    Blade, Chassis, Column, ColumnType, Discrete, Disk, Entity, EntityKind, Fan, Filter, Filters,
    Nic, Page, Psu, RepositoryError, ScannedPort, StorageBlade,
};
use crate::ports::{InventoryRepository, UpsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Run `$body` with `$t` bound to the record type of `$kind`
macro_rules! with_record {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            EntityKind::Chassis => {
                type $t = Chassis;
                $body
            }
            EntityKind::Blade => {
                type $t = Blade;
                $body
            }
            EntityKind::StorageBlade => {
                type $t = StorageBlade;
                $body
            }
            EntityKind::Discrete => {
                type $t = Discrete;
                $body
            }
            EntityKind::Nic => {
                type $t = Nic;
                $body
            }
            EntityKind::Disk => {
                type $t = Disk;
                $body
            }
            EntityKind::Psu => {
                type $t = Psu;
                $body
            }
            EntityKind::Fan => {
                type $t = Fan;
                $body
            }
            EntityKind::ScannedPort => {
                type $t = ScannedPort;
                $body
            }
        }
    };
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn schema() -> String {
    EntityKind::all()
        .iter()
        .map(|kind| {
            let columns: Vec<String> = kind
                .columns()
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), c.kind.sql()))
                .collect();
            let keys: Vec<String> = key_columns(*kind).iter().map(|k| quote(k)).collect();
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}));",
                kind.table(),
                columns.join(", "),
                keys.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn key_columns(kind: EntityKind) -> &'static [&'static str] {
    with_record!(kind, T => T::KEY)
}

/// Convert a filter value to the column's storage type
fn filter_value(column: &Column, raw: &str) -> Result<SqlValue, RepositoryError> {
    let invalid = || {
        RepositoryError::InvalidEntity(format!(
            "{}: {:?} is not a valid {:?}",
            column.name, raw, column.kind
        ))
    };
    match column.kind {
        ColumnType::Text => Ok(SqlValue::Text(raw.to_string())),
        ColumnType::Integer => raw.trim().parse().map(SqlValue::Integer).map_err(|_| invalid()),
        ColumnType::Real => raw.trim().parse().map(SqlValue::Real).map_err(|_| invalid()),
        ColumnType::Boolean => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(SqlValue::Integer(1)),
            "false" | "0" => Ok(SqlValue::Integer(0)),
            _ => Err(invalid()),
        },
    }
}

/// WHERE clause and parameters for a filter set; values OR'd, filters AND'ed
fn where_clause(
    kind: EntityKind,
    filters: &Filters,
) -> Result<(String, Vec<SqlValue>), RepositoryError> {
    filters.validate(kind)?;
    let columns = kind.columns();
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for filter in filters.iter() {
        let column = columns
            .iter()
            .find(|c| c.name == filter.field())
            .ok_or_else(|| RepositoryError::UnknownField {
                table: kind.table().to_string(),
                field: filter.field().to_string(),
            })?;
        let name = quote(&column.name);
        match filter {
            Filter::In { values, .. } | Filter::NotIn { values, .. } if values.is_empty() => {
                let never = matches!(filter, Filter::In { .. });
                clauses.push(if never { "0" } else { "1" }.to_string());
            }
            Filter::In { values, .. } | Filter::NotIn { values, .. } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                let op = if matches!(filter, Filter::In { .. }) { "IN" } else { "NOT IN" };
                clauses.push(format!("{name} {op} ({placeholders})"));
                for value in values {
                    params.push(filter_value(column, value)?);
                }
            }
            Filter::LessThan { value, .. } => {
                if column.kind == ColumnType::Text {
                    clauses.push(format!("julianday({name}) < julianday(?)"));
                } else {
                    clauses.push(format!("{name} < ?"));
                }
                params.push(filter_value(column, value)?);
            }
        }
    }

    if clauses.is_empty() {
        Ok(("1".to_string(), params))
    } else {
        Ok((clauses.join(" AND "), params))
    }
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[Column]) -> rusqlite::Result<Map<String, Value>> {
    let mut map = Map::new();
    for (i, column) in columns.iter().enumerate() {
        let value = match column.kind {
            ColumnType::Text => Value::from(row.get::<_, Option<String>>(i)?.unwrap_or_default()),
            ColumnType::Integer => Value::from(row.get::<_, Option<i64>>(i)?.unwrap_or_default()),
            ColumnType::Real => Value::from(row.get::<_, Option<f64>>(i)?.unwrap_or_default()),
            ColumnType::Boolean => {
                Value::Bool(row.get::<_, Option<i64>>(i)?.unwrap_or_default() != 0)
            }
        };
        map.insert(column.name.clone(), value);
    }
    Ok(map)
}

fn select<T: Record>(
    conn: &Connection,
    clause: &str,
    mut params: Vec<SqlValue>,
    page: Page,
) -> Result<Vec<T>, RepositoryError> {
    let columns = T::columns();
    let names: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
    let keys: Vec<String> = T::KEY.iter().map(|k| quote(k)).collect();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        names.join(", "),
        T::TABLE,
        clause,
        keys.join(", ")
    );
    params.push(SqlValue::Integer(page.limit.map_or(-1, |l| l as i64)));
    params.push(SqlValue::Integer(page.offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| read_row(row, &columns))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(serde_json::from_value(Value::Object(row?))?);
    }
    Ok(records)
}

fn load<T: Record>(conn: &Connection, key: &[String]) -> Result<Option<T>, RepositoryError> {
    if key.len() != T::KEY.len() {
        return Err(RepositoryError::InvalidEntity(format!(
            "{} is keyed by {:?}, got {} values",
            T::TABLE,
            T::KEY,
            key.len()
        )));
    }
    let clause: Vec<String> = T::KEY.iter().map(|k| format!("{} = ?", quote(k))).collect();
    let columns = T::columns();
    let params: Vec<SqlValue> = T::KEY
        .iter()
        .zip(key)
        .map(|(name, value)| {
            let column = columns.iter().find(|c| c.name == *name);
            match column {
                Some(column) => filter_value(column, value),
                None => Ok(SqlValue::Text(value.clone())),
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(select::<T>(conn, &clause.join(" AND "), params, Page::new(0, 1))?
        .into_iter()
        .next())
}

fn children<T: Record>(
    conn: &Connection,
    owner_field: &str,
    owner: &str,
) -> Result<Vec<T>, RepositoryError> {
    select::<T>(
        conn,
        &format!("{} = ?", quote(owner_field)),
        vec![SqlValue::Text(owner.to_string())],
        Page::all(),
    )
}

/// Attach stored child collections to a parent record
fn hydrate(conn: &Connection, entity: Entity) -> Result<Entity, RepositoryError> {
    Ok(match entity {
        Entity::Chassis(mut chassis) => {
            chassis.nics = children(conn, "chassis_serial", &chassis.serial)?;
            chassis.psus = children(conn, "chassis_serial", &chassis.serial)?;
            chassis.fans = children(conn, "chassis_serial", &chassis.serial)?;
            Entity::Chassis(chassis)
        }
        Entity::Blade(mut blade) => {
            blade.nics = children(conn, "blade_serial", &blade.serial)?;
            blade.disks = children(conn, "blade_serial", &blade.serial)?;
            Entity::Blade(blade)
        }
        Entity::Discrete(mut discrete) => {
            discrete.nics = children(conn, "discrete_serial", &discrete.serial)?;
            discrete.disks = children(conn, "discrete_serial", &discrete.serial)?;
            discrete.psus = children(conn, "discrete_serial", &discrete.serial)?;
            Entity::Discrete(discrete)
        }
        other => other,
    })
}

fn load_entity(
    conn: &Connection,
    kind: EntityKind,
    key: &[String],
) -> Result<Option<Entity>, RepositoryError> {
    let entity = with_record!(kind, T => load::<T>(conn, key)?.map(Record::into_entity));
    entity.map(|e| hydrate(conn, e)).transpose()
}

fn sql_value(column: &Column, value: Option<&Value>) -> SqlValue {
    match (column.kind, value) {
        (_, None | Some(Value::Null)) => SqlValue::Null,
        (_, Some(Value::Bool(b))) => SqlValue::Integer(i64::from(*b)),
        (ColumnType::Real, Some(Value::Number(n))) => {
            n.as_f64().map_or(SqlValue::Null, SqlValue::Real)
        }
        (_, Some(Value::Number(n))) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        (_, Some(Value::String(s))) => SqlValue::Text(s.clone()),
        (_, Some(other)) => SqlValue::Text(other.to_string()),
    }
}

/// Merge a record into its stored row (if any) and write it back
fn merge_write<T: Record>(
    conn: &Connection,
    record: T,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let key = record.key_values();
    if key.iter().any(String::is_empty) {
        return Err(RepositoryError::InvalidEntity(format!(
            "{} without {}",
            T::TABLE,
            T::KEY.join("/")
        )));
    }

    let merged = match load::<T>(conn, &key)? {
        Some(stored) => stored.merge(&record)?,
        None => record,
    };
    let mut map = to_map(&merged)?;
    map.insert("updated_at".to_string(), serde_json::to_value(now)?);

    let columns = T::columns();
    let names: Vec<String> = columns.iter().map(|c| quote(&c.name)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let values: Vec<SqlValue> = columns.iter().map(|c| sql_value(c, map.get(&c.name))).collect();
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            T::TABLE,
            names.join(", "),
            placeholders
        ),
        params_from_iter(values.iter()),
    )?;
    Ok(())
}

/// Write a child collection member, skipping members without a key
fn write_child<T: Record>(
    conn: &Connection,
    child: T,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    if child.key_values().iter().any(String::is_empty) {
        log::debug!("op=persist table={} skipping child without key", T::TABLE);
        return Ok(());
    }
    merge_write(conn, child, now)
}

fn write_chassis(
    conn: &Connection,
    mut chassis: Chassis,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let serial = chassis.serial.clone();
    for mut nic in std::mem::take(&mut chassis.nics) {
        nic.chassis_serial = serial.clone();
        nic.blade_serial.clear();
        nic.discrete_serial.clear();
        write_child(conn, nic, now)?;
    }
    for mut psu in std::mem::take(&mut chassis.psus) {
        psu.chassis_serial = serial.clone();
        psu.discrete_serial.clear();
        write_child(conn, psu, now)?;
    }
    for mut fan in std::mem::take(&mut chassis.fans) {
        fan.chassis_serial = serial.clone();
        write_child(conn, fan, now)?;
    }
    merge_write(conn, chassis, now)
}

/// Clear a back-reference to a chassis that is not stored
fn known_chassis(
    conn: &Connection,
    table: &str,
    serial: &str,
    chassis_serial: &mut String,
) -> Result<(), RepositoryError> {
    if !chassis_serial.is_empty() && load::<Chassis>(conn, &[chassis_serial.clone()])?.is_none() {
        log::warn!(
            "op=persist table={} serial={} chassis={} unknown chassis, storing without it",
            table,
            serial,
            chassis_serial
        );
        chassis_serial.clear();
    }
    Ok(())
}

fn write_blade(
    conn: &Connection,
    mut blade: Blade,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let serial = blade.serial.clone();
    known_chassis(conn, Blade::TABLE, &serial, &mut blade.chassis_serial)?;
    conn.execute(
        &format!("DELETE FROM {} WHERE serial = ?1", Discrete::TABLE),
        [&serial],
    )?;
    for mut nic in std::mem::take(&mut blade.nics) {
        nic.blade_serial = serial.clone();
        nic.discrete_serial.clear();
        nic.chassis_serial.clear();
        write_child(conn, nic, now)?;
    }
    for mut disk in std::mem::take(&mut blade.disks) {
        disk.blade_serial = serial.clone();
        disk.discrete_serial.clear();
        write_child(conn, disk, now)?;
    }
    merge_write(conn, blade, now)
}

fn write_discrete(
    conn: &Connection,
    mut discrete: Discrete,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let serial = discrete.serial.clone();
    conn.execute(
        &format!("DELETE FROM {} WHERE serial = ?1", Blade::TABLE),
        [&serial],
    )?;
    for mut nic in std::mem::take(&mut discrete.nics) {
        nic.discrete_serial = serial.clone();
        nic.blade_serial.clear();
        nic.chassis_serial.clear();
        write_child(conn, nic, now)?;
    }
    for mut disk in std::mem::take(&mut discrete.disks) {
        disk.discrete_serial = serial.clone();
        disk.blade_serial.clear();
        write_child(conn, disk, now)?;
    }
    for mut psu in std::mem::take(&mut discrete.psus) {
        psu.discrete_serial = serial.clone();
        psu.chassis_serial.clear();
        write_child(conn, psu, now)?;
    }
    merge_write(conn, discrete, now)
}

fn upsert(conn: &mut Connection, entity: Entity) -> Result<UpsertOutcome, RepositoryError> {
    let kind = entity.kind();
    let key = entity.key();
    if key.iter().any(String::is_empty) {
        return Err(RepositoryError::InvalidEntity(format!("{} without key", kind.table())));
    }

    let now = Utc::now();
    let tx = conn.transaction()?;
    let before = load_entity(&tx, kind, &key)?;
    match entity {
        Entity::Chassis(chassis) => write_chassis(&tx, chassis, now)?,
        Entity::Blade(blade) => write_blade(&tx, blade, now)?,
        Entity::Discrete(discrete) => write_discrete(&tx, discrete, now)?,
        Entity::StorageBlade(mut storage) => {
            known_chassis(
                &tx,
                StorageBlade::TABLE,
                &storage.serial,
                &mut storage.chassis_serial,
            )?;
            merge_write(&tx, storage, now)?
        }
        Entity::Nic(nic) => {
            let owners = [&nic.blade_serial, &nic.discrete_serial, &nic.chassis_serial]
                .iter()
                .filter(|s| !s.is_empty())
                .count();
            if owners != 1 {
                return Err(RepositoryError::InvalidEntity(format!(
                    "nic {} must have exactly one owner, has {}",
                    nic.mac_address, owners
                )));
            }
            merge_write(&tx, nic, now)?
        }
        Entity::Disk(disk) => merge_write(&tx, disk, now)?,
        Entity::Psu(psu) => merge_write(&tx, psu, now)?,
        Entity::Fan(fan) => merge_write(&tx, fan, now)?,
        Entity::ScannedPort(port) => merge_write(&tx, port, now)?,
    }
    let after = load_entity(&tx, kind, &key)?.ok_or_else(|| {
        RepositoryError::Database(format!(
            "{} {} missing after write",
            kind.table(),
            key.join("/")
        ))
    })?;
    tx.commit()?;

    Ok(UpsertOutcome { before, after })
}

/// Inventory repository backed by a single SQLite connection
///
/// The connection is guarded by a mutex and used from blocking tasks, so
/// writes are serialized across workers.
#[derive(Clone)]
pub struct SqliteInventoryRepository {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteInventoryRepository {
    /// Open (or create) the database file and its tables
    ///
    /// # Arguments
    /// * `path` - Database file; parent directories are created
    pub fn open(path: &str) -> Result<Self, RepositoryError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RepositoryError::Database(format!("failed creating {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
            ",
        )?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(&schema())?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_connection<F, R>(&self, f: F) -> Result<R, RepositoryError>
    where
        F: FnOnce(&mut Connection) -> Result<R, RepositoryError> + Send + 'static,
        R: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut conn = connection
                .lock()
                .map_err(|_| RepositoryError::Database("connection lock poisoned".to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::Database(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn get_one(
        &self,
        kind: EntityKind,
        key: &[String],
    ) -> Result<Option<Entity>, RepositoryError> {
        let key = key.to_vec();
        self.with_connection(move |conn| load_entity(conn, kind, &key)).await
    }

    async fn get_all(&self, kind: EntityKind, page: Page) -> Result<Vec<Entity>, RepositoryError> {
        self.get_all_by_filters(kind, page, &Filters::new()).await
    }

    async fn get_all_by_filters(
        &self,
        kind: EntityKind,
        page: Page,
        filters: &Filters,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let (clause, params) = where_clause(kind, filters)?;
        self.with_connection(move |conn| {
            let entities = with_record!(kind, T => select::<T>(conn, &clause, params, page)?
                .into_iter()
                .map(Record::into_entity)
                .collect::<Vec<_>>());
            entities.into_iter().map(|e| hydrate(conn, e)).collect()
        })
        .await
    }

    async fn count(&self, kind: EntityKind, filters: &Filters) -> Result<usize, RepositoryError> {
        let (clause, params) = where_clause(kind, filters)?;
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {}", kind.table(), clause),
                params_from_iter(params.iter()),
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn update_or_create(&self, entity: Entity) -> Result<UpsertOutcome, RepositoryError> {
        self.with_connection(move |conn| upsert(conn, entity)).await
    }
}
