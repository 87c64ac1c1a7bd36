// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entities, raw platform rows, and write payloads.

use serde::de::DeserializeOwned;

use crate::error::SyncError;
use crate::types::{EntityId, EntityKind};
use crate::value::{Fields, Value};

/// A raw row as returned by the remote platform, before validation.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A validated record of one kind, keyed by identifier.
///
/// `fields` never contains `id`; the identifier lives in [`Entity::id`].
/// `version` is a local revision, bumped by the entity store on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: EntityId,
    pub fields: Fields,
    pub version: u64,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>, fields: Fields) -> Self {
        Self {
            kind,
            id: id.into(),
            fields,
            version: 0,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// The entity as a JSON row, `id` included.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(
            "id".to_string(),
            serde_json::Value::String(self.id.0.clone()),
        );
        for (name, value) in &self.fields {
            row.insert(name.clone(), value.to_json());
        }
        row
    }

    /// Decode into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        serde_json::from_value(serde_json::Value::Object(self.to_row())).map_err(|e| {
            SyncError::Schema {
                kind: self.kind,
                message: e.to_string(),
            }
        })
    }
}

/// Convert a raw row to fields, `id` included. Columns that have no
/// [`Value`] representation (nested objects, floats) are skipped.
pub fn row_fields(row: &Row) -> Fields {
    row.iter()
        .filter_map(|(name, json)| Value::from_json(json).map(|v| (name.clone(), v)))
        .collect()
}

/// Target of a remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// Insert; the platform assigns the identifier.
    New,
    Existing(EntityId),
}

/// Change carried by a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Merge these fields into the record (or create it).
    Patch(Fields),
    Delete,
}

/// Authoritative result of a successful remote write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteAck {
    Row(Row),
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Titled {
        id: String,
        title: String,
    }

    #[test]
    fn decode_includes_id() {
        let entity = Entity::new(
            EntityKind::Project,
            "P1",
            crate::fields! { "title" => "X" },
        );
        let titled: Titled = entity.decode().unwrap();
        assert_eq!(titled.id, "P1");
        assert_eq!(titled.title, "X");
    }

    #[test]
    fn decode_failure_is_schema_error() {
        let entity = Entity::new(EntityKind::Project, "P1", Fields::new());
        let err = entity.decode::<Titled>().unwrap_err();
        assert!(matches!(err, SyncError::Schema { kind: EntityKind::Project, .. }));
    }

    #[test]
    fn row_fields_skips_objects() {
        let row: Row = serde_json::from_value(serde_json::json!({
            "id": "P1",
            "title": "X",
            "owner": {"name": "nested"}
        }))
        .unwrap();
        let fields = row_fields(&row);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("id"), Some(&Value::from("P1")));
    }
}
