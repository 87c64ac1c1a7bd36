// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-kind row tables with not-null checks and server-side defaults.

use std::collections::HashMap;

use campsync_core::{EntityId, EntityKind, Fields, QueryDescriptor, Row, SyncError, Value};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use uuid::Uuid;

/// Relation name, as it appears in rejection messages.
pub(crate) fn relation(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "users",
        EntityKind::Project => "projects",
        EntityKind::ProjectMember => "project_members",
        EntityKind::ProjectPrivateData => "project_private_data",
        EntityKind::Event => "events",
        EntityKind::Friendship => "friendships",
        EntityKind::FriendRequest => "friend_requests",
        EntityKind::Message => "messages",
    }
}

fn required_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::User => &["name", "email"],
        EntityKind::Project => &["title"],
        EntityKind::ProjectMember => &["project_id", "user_id", "role"],
        EntityKind::ProjectPrivateData => &["project_id", "repo_link"],
        EntityKind::Event => &["title", "event_type", "date"],
        EntityKind::Friendship => &["user1_id", "user2_id", "status"],
        EntityKind::FriendRequest => &["sender_id", "receiver_id", "status"],
        EntityKind::Message => &["chat_id", "sender_id", "receiver_id", "content"],
    }
}

fn rejected(kind: EntityKind, message: String) -> SyncError {
    SyncError::MutationRejected { kind, message }
}

fn to_row(fields: &Fields) -> Row {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

struct Stored {
    fields: Fields,
}

impl Stored {
    fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }
}

#[derive(Default)]
pub(crate) struct Tables {
    tables: HashMap<EntityKind, Vec<Stored>>,
    last_created: Option<DateTime<Utc>>,
}

impl Tables {
    /// Server clock. Strictly increasing, so `created_at` ordering matches
    /// insertion order even within one clock tick.
    pub(crate) fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created = Some(now);
        now
    }

    pub(crate) fn query(&self, descriptor: &QueryDescriptor) -> Vec<Row> {
        let rows = self
            .tables
            .get(&descriptor.kind)
            .map(Vec::as_slice)
            .unwrap_or_default();
        descriptor
            .apply(rows.iter(), |stored| &stored.fields)
            .into_iter()
            .map(|stored| to_row(&stored.fields))
            .collect()
    }

    pub(crate) fn rows(&self, kind: EntityKind) -> Vec<Row> {
        self.tables
            .get(&kind)
            .map(|rows| rows.iter().map(|s| to_row(&s.fields)).collect())
            .unwrap_or_default()
    }

    fn check_not_null(kind: EntityKind, fields: &Fields) -> Result<(), SyncError> {
        for column in required_columns(kind) {
            if fields.get(*column).is_none_or(Value::is_null) {
                return Err(rejected(
                    kind,
                    format!(
                        "null value in column \"{column}\" of relation \"{}\" violates not-null constraint",
                        relation(kind)
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Insert a row. `id` and `created_at` are assigned unless supplied.
    pub(crate) fn insert(&mut self, kind: EntityKind, mut fields: Fields) -> Result<Row, SyncError> {
        let id = match fields.get("id") {
            Some(Value::Text(id)) if !id.is_empty() => id.clone(),
            Some(Value::Null) | None => Uuid::new_v4().to_string(),
            Some(other) => {
                return Err(rejected(
                    kind,
                    format!("invalid input syntax for type uuid: {other:?}"),
                ));
            }
        };
        let table = self.tables.entry(kind).or_default();
        if table.iter().any(|s| s.id() == Some(id.as_str())) {
            return Err(rejected(
                kind,
                format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    relation(kind)
                ),
            ));
        }
        fields.insert("id".into(), Value::Text(id));
        if fields.get("created_at").is_none_or(Value::is_null) {
            let created_at = self.now().to_rfc3339_opts(SecondsFormat::Micros, true);
            fields.insert("created_at".into(), Value::Text(created_at));
        }
        Self::check_not_null(kind, &fields)?;

        let row = to_row(&fields);
        self.tables.entry(kind).or_default().push(Stored { fields });
        Ok(row)
    }

    /// Merge `patch` into an existing row. The identifier cannot change.
    pub(crate) fn update(
        &mut self,
        kind: EntityKind,
        id: &EntityId,
        mut patch: Fields,
    ) -> Result<Row, SyncError> {
        patch.remove("id");
        let stored = self
            .tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|s| s.id() == Some(id.as_str())))
            .ok_or_else(|| rejected(kind, format!("no row in \"{}\" with id {id}", relation(kind))))?;

        let mut merged = stored.fields.clone();
        merged.extend(patch);
        Self::check_not_null(kind, &merged)?;
        stored.fields = merged;
        Ok(to_row(&stored.fields))
    }

    pub(crate) fn delete(&mut self, kind: EntityKind, id: &EntityId) -> Result<(), SyncError> {
        let rows = self.tables.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|s| s.id() != Some(id.as_str()));
        if rows.len() == before {
            return Err(rejected(
                kind,
                format!("no row in \"{}\" with id {id}", relation(kind)),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_core::{fields, Filter, SortKey};

    #[test]
    fn insert_assigns_id_and_increasing_timestamps() {
        let mut tables = Tables::default();
        let a = tables
            .insert(EntityKind::Project, fields! { "title" => "A" })
            .unwrap();
        let b = tables
            .insert(EntityKind::Project, fields! { "title" => "B" })
            .unwrap();
        assert_ne!(a["id"], b["id"]);
        assert!(a["created_at"].as_str().unwrap() < b["created_at"].as_str().unwrap());
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let mut tables = Tables::default();
        let err = tables
            .insert(EntityKind::Event, fields! { "title" => "Hack", "date" => "2026-11-01" })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "null value in column \"event_type\" of relation \"events\" violates not-null constraint"
        );
        assert!(tables.rows(EntityKind::Event).is_empty());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut tables = Tables::default();
        tables
            .insert(EntityKind::Project, fields! { "id" => "P1", "title" => "A" })
            .unwrap();
        let err = tables
            .insert(EntityKind::Project, fields! { "id" => "P1", "title" => "B" })
            .unwrap_err();
        assert!(err.to_string().contains("projects_pkey"));
    }

    #[test]
    fn update_merges_and_keeps_id() {
        let mut tables = Tables::default();
        tables
            .insert(EntityKind::Project, fields! { "id" => "P1", "title" => "A" })
            .unwrap();
        let row = tables
            .update(
                EntityKind::Project,
                &EntityId::new("P1"),
                fields! { "id" => "P2", "looking_for" => "designers" },
            )
            .unwrap();
        assert_eq!(row["id"], "P1");
        assert_eq!(row["title"], "A");
        assert_eq!(row["looking_for"], "designers");
    }

    #[test]
    fn query_applies_filters_sort_and_limit() {
        let mut tables = Tables::default();
        for (title, date) in [("b", "2026-12-01"), ("a", "2026-10-01"), ("c", "2026-11-01")] {
            tables
                .insert(
                    EntityKind::Event,
                    fields! { "title" => title, "event_type" => "Other", "date" => date },
                )
                .unwrap();
        }
        let upcoming = QueryDescriptor::new(EntityKind::Event)
            .filter(Filter::gte("date", "2026-10-15"))
            .sort(SortKey::asc("date"))
            .limit(1);
        let rows = tables.query(&upcoming);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "c");
    }
}
