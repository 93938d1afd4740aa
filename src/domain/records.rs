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

//! Storage contract of the canonical entities
//!
//! Every entity maps to one table. Scalar fields become columns, `Vec` fields are
//! child collections stored in their own tables and linked by back-reference.

use crate::domain::{
    Blade, Chassis, Discrete, Disk, Entity, EntityKind, Fan, Nic, Psu, RepositoryError,
    ScannedPort, StorageBlade,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// SQL affinity of a column, derived from the field's default value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

/// A persisted entity type
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// Table name (singular)
    const TABLE: &'static str;
    /// Primary key columns
    const KEY: &'static [&'static str];
    /// Columns always taken from the newer snapshot when merging
    const REPLACE_ON_MERGE: &'static [&'static str] = &[];

    fn kind() -> EntityKind;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: Entity) -> Option<Self>;

    /// Primary key values in `KEY` order
    fn key_values(&self) -> Vec<String> {
        let map = to_map(self).unwrap_or_default();
        Self::KEY
            .iter()
            .map(|k| scalar_to_string(map.get(*k).unwrap_or(&Value::Null)))
            .collect()
    }

    /// Scalar columns of the table
    fn columns() -> Vec<Column> {
        let map = to_map(&Self::default()).unwrap_or_default();
        map.iter()
            .filter_map(|(name, value)| {
                let kind = match value {
                    Value::Bool(_) => ColumnType::Boolean,
                    Value::Number(n) if n.is_f64() => ColumnType::Real,
                    Value::Number(_) => ColumnType::Integer,
                    Value::String(_) => ColumnType::Text,
                    _ => return None,
                };
                Some(Column {
                    name: name.clone(),
                    kind,
                })
            })
            .collect()
    }

    /// Merge a newer snapshot into a stored one, keeping stored values where the
    /// newer snapshot carries a zero value
    fn merge(&self, newer: &Self) -> Result<Self, RepositoryError> {
        let mut merged = to_map(self)?;
        for (name, value) in to_map(newer)? {
            let replace = Self::REPLACE_ON_MERGE.contains(&name.as_str())
                || matches!(value, Value::Bool(_))
                || !is_zero(&value);
            if replace {
                merged.insert(name, value);
            }
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

pub(crate) fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>, RepositoryError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(RepositoryError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Zero value in the Go sense: empty string, 0, empty list, null
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) => false,
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

macro_rules! record {
    ($ty:ident, $table:literal, [$($key:literal),+] $(, replace = [$($replace:literal),*])?) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;
            const KEY: &'static [&'static str] = &[$($key),+];
            $(const REPLACE_ON_MERGE: &'static [&'static str] = &[$($replace),*];)?

            fn kind() -> EntityKind {
                EntityKind::$ty
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

record!(Chassis, "chassis", ["serial"]);
record!(Blade, "blade", ["serial"]);
record!(StorageBlade, "storage_blade", ["serial"]);
record!(Discrete, "discrete", ["serial"]);
record!(
    Nic,
    "nic",
    ["mac_address"],
    replace = ["blade_serial", "discrete_serial", "chassis_serial"]
);
record!(
    Disk,
    "disk",
    ["serial"],
    replace = ["blade_serial", "discrete_serial"]
);
record!(
    Psu,
    "psu",
    ["serial"],
    replace = ["chassis_serial", "discrete_serial"]
);
record!(Fan, "fan", ["serial"]);
record!(
    ScannedPort,
    "scanned_port",
    ["ip", "port", "protocol", "scanned_by"],
    replace = ["state"]
);

impl Entity {
    /// Primary key values of the wrapped record
    pub fn key(&self) -> Vec<String> {
        match self {
            Entity::Chassis(r) => r.key_values(),
            Entity::Blade(r) => r.key_values(),
            Entity::StorageBlade(r) => r.key_values(),
            Entity::Discrete(r) => r.key_values(),
            Entity::Nic(r) => r.key_values(),
            Entity::Disk(r) => r.key_values(),
            Entity::Psu(r) => r.key_values(),
            Entity::Fan(r) => r.key_values(),
            Entity::ScannedPort(r) => r.key_values(),
        }
    }
}

impl EntityKind {
    /// Table backing this kind
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Chassis => Chassis::TABLE,
            EntityKind::Blade => Blade::TABLE,
            EntityKind::StorageBlade => StorageBlade::TABLE,
            EntityKind::Discrete => Discrete::TABLE,
            EntityKind::Nic => Nic::TABLE,
            EntityKind::Disk => Disk::TABLE,
            EntityKind::Psu => Psu::TABLE,
            EntityKind::Fan => Fan::TABLE,
            EntityKind::ScannedPort => ScannedPort::TABLE,
        }
    }

    /// Scalar columns of the table backing this kind
    pub fn columns(&self) -> Vec<Column> {
        match self {
            EntityKind::Chassis => Chassis::columns(),
            EntityKind::Blade => Blade::columns(),
            EntityKind::StorageBlade => StorageBlade::columns(),
            EntityKind::Discrete => Discrete::columns(),
            EntityKind::Nic => Nic::columns(),
            EntityKind::Disk => Disk::columns(),
            EntityKind::Psu => Psu::columns(),
            EntityKind::Fan => Fan::columns(),
            EntityKind::ScannedPort => ScannedPort::columns(),
        }
    }

    pub fn all() -> [EntityKind; 9] {
        [
            EntityKind::Chassis,
            EntityKind::Blade,
            EntityKind::StorageBlade,
            EntityKind::Discrete,
            EntityKind::Nic,
            EntityKind::Disk,
            EntityKind::Psu,
            EntityKind::Fan,
            EntityKind::ScannedPort,
        ]
    }
}
