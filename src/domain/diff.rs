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

//! Structural comparison of two snapshots of the same device

use crate::domain::{Entity, RepositoryError};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Fields that change on every poll and never count as a change
pub const VOLATILE_FIELDS: [&str; 4] = ["updated_at", "power_kw", "temp_c", "current_rpm"];

/// A single field difference
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Dotted path of the field, list members indexed as `nics[0]`
    pub field: String,
    pub before: Value,
    pub after: Value,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.before, self.after)
    }
}

/// Compare two snapshots and return every non-volatile field that differs
///
/// Lists are sorted by `mac_address` or `serial` before comparison. Lists of
/// different length produce one `count differs` change instead of per-member
/// changes.
///
/// # Arguments
/// * `before` - Stored snapshot
/// * `after` - New snapshot
///
/// # Returns
/// * `Ok(Vec<Change>)` - Differences, empty when the device is unchanged
/// * `Err(RepositoryError)` - A snapshot could not be serialized
pub fn diff<T: Serialize>(before: &T, after: &T) -> Result<Vec<Change>, RepositoryError> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;
    let mut changes = Vec::new();
    compare("", &before, &after, &mut changes);
    Ok(changes)
}

/// Compare two stored entities of the same kind
pub fn diff_entities(before: &Entity, after: &Entity) -> Result<Vec<Change>, RepositoryError> {
    match (before, after) {
        (Entity::Chassis(b), Entity::Chassis(a)) => diff(b, a),
        (Entity::Blade(b), Entity::Blade(a)) => diff(b, a),
        (Entity::StorageBlade(b), Entity::StorageBlade(a)) => diff(b, a),
        (Entity::Discrete(b), Entity::Discrete(a)) => diff(b, a),
        (Entity::Nic(b), Entity::Nic(a)) => diff(b, a),
        (Entity::Disk(b), Entity::Disk(a)) => diff(b, a),
        (Entity::Psu(b), Entity::Psu(a)) => diff(b, a),
        (Entity::Fan(b), Entity::Fan(a)) => diff(b, a),
        (Entity::ScannedPort(b), Entity::ScannedPort(a)) => diff(b, a),
        _ => Err(RepositoryError::InvalidEntity(format!(
            "cannot compare {} with {}",
            before.kind().table(),
            after.kind().table()
        ))),
    }
}

fn compare(path: &str, before: &Value, after: &Value, changes: &mut Vec<Change>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                if VOLATILE_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                let field = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                compare(
                    &field,
                    a.get(key).unwrap_or(&Value::Null),
                    b.get(key).unwrap_or(&Value::Null),
                    changes,
                );
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                changes.push(Change {
                    field: format!("{path} count differs"),
                    before: Value::from(a.len()),
                    after: Value::from(b.len()),
                });
                return;
            }
            let mut a: Vec<&Value> = a.iter().collect();
            let mut b: Vec<&Value> = b.iter().collect();
            a.sort_by(|x, y| by_identity(x, y));
            b.sort_by(|x, y| by_identity(x, y));
            for (i, (x, y)) in a.into_iter().zip(b).enumerate() {
                compare(&format!("{path}[{i}]"), x, y, changes);
            }
        }
        (a, b) if a != b => changes.push(Change {
            field: path.to_string(),
            before: a.clone(),
            after: b.clone(),
        }),
        _ => {}
    }
}

fn identity(value: &Value) -> &str {
    value
        .get("mac_address")
        .or_else(|| value.get("serial"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn by_identity(a: &Value, b: &Value) -> Ordering {
    identity(a).cmp(identity(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Blade, Chassis, Nic};

    fn nic(mac: &str) -> Nic {
        Nic {
            mac_address: mac.to_string(),
            name: "eth".to_string(),
            blade_serial: "b1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_volatile_fields_are_ignored() {
        let before = Blade {
            serial: "b1".into(),
            power_kw: 0.21,
            temp_c: 22,
            ..Default::default()
        };
        let after = Blade {
            power_kw: 0.35,
            temp_c: 27,
            updated_at: chrono::Utc::now(),
            ..before.clone()
        };
        assert!(diff(&before, &after).unwrap().is_empty());
    }

    #[test]
    fn test_nic_order_does_not_matter() {
        let before = Blade {
            serial: "b1".into(),
            nics: vec![nic("aa:00:00:00:00:01"), nic("aa:00:00:00:00:02")],
            ..Default::default()
        };
        let after = Blade {
            nics: vec![nic("aa:00:00:00:00:02"), nic("aa:00:00:00:00:01")],
            ..before.clone()
        };
        assert!(diff(&before, &after).unwrap().is_empty());
    }

    #[test]
    fn test_count_difference_is_single_change() {
        let before = Chassis {
            serial: "c1".into(),
            blades: vec![Blade::default()],
            ..Default::default()
        };
        let after = Chassis {
            blades: vec![Blade::default(), Blade::default()],
            ..before.clone()
        };

        let changes = diff(&before, &after).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "blades count differs");
        assert_eq!(changes[0].before, Value::from(1));
        assert_eq!(changes[0].after, Value::from(2));
    }

    #[test]
    fn test_nested_field_change_is_reported() {
        let before = Blade {
            serial: "b1".into(),
            nics: vec![nic("aa:00:00:00:00:01")],
            ..Default::default()
        };
        let mut after = before.clone();
        after.nics[0].speed = "10G".into();
        after.bios_version = "P89".into();

        let changes = diff(&before, &after).unwrap();
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["bios_version", "nics[0].speed"]);
    }
}
