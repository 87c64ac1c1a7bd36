// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed records per entity kind, and row validation.
//!
//! Rows arrive from the platform as untyped JSON. Before anything enters the
//! entity store it is decoded into the record type for its kind and encoded
//! back, which rejects ill-typed columns, normalizes `null` lists to empty
//! lists, and drops columns the schema does not know (joined relation
//! payloads, for instance).

use campsync_core::entity::row_fields;
use campsync_core::{Entity, EntityId, EntityKind, Row, SyncError};
use serde::{Deserialize, Deserializer, Serialize};

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub looking_for: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPrivateData {
    pub id: String,
    pub project_id: String,
    pub repo_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_type: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub domains: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub registration_link: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Friendship {
    /// The other side of the friendship, if `user_id` is one side.
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A validated row, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    User(UserProfile),
    Project(Project),
    ProjectMember(ProjectMember),
    ProjectPrivateData(ProjectPrivateData),
    Event(Event),
    Friendship(Friendship),
    FriendRequest(FriendRequest),
    Message(ChatMessage),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::Project(_) => EntityKind::Project,
            Record::ProjectMember(_) => EntityKind::ProjectMember,
            Record::ProjectPrivateData(_) => EntityKind::ProjectPrivateData,
            Record::Event(_) => EntityKind::Event,
            Record::Friendship(_) => EntityKind::Friendship,
            Record::FriendRequest(_) => EntityKind::FriendRequest,
            Record::Message(_) => EntityKind::Message,
        }
    }

    /// Decode a raw row as the record type for `kind`.
    pub fn from_row(kind: EntityKind, row: &Row) -> Result<Self, SyncError> {
        let json = serde_json::Value::Object(row.clone());
        let schema_err = |e: serde_json::Error| SyncError::Schema {
            kind,
            message: e.to_string(),
        };
        Ok(match kind {
            EntityKind::User => Record::User(serde_json::from_value(json).map_err(schema_err)?),
            EntityKind::Project => {
                Record::Project(serde_json::from_value(json).map_err(schema_err)?)
            }
            EntityKind::ProjectMember => {
                Record::ProjectMember(serde_json::from_value(json).map_err(schema_err)?)
            }
            EntityKind::ProjectPrivateData => {
                Record::ProjectPrivateData(serde_json::from_value(json).map_err(schema_err)?)
            }
            EntityKind::Event => Record::Event(serde_json::from_value(json).map_err(schema_err)?),
            EntityKind::Friendship => {
                Record::Friendship(serde_json::from_value(json).map_err(schema_err)?)
            }
            EntityKind::FriendRequest => {
                Record::FriendRequest(serde_json::from_value(json).map_err(schema_err)?)
            }
            EntityKind::Message => {
                Record::Message(serde_json::from_value(json).map_err(schema_err)?)
            }
        })
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Record::User(r) => serde_json::to_value(r),
            Record::Project(r) => serde_json::to_value(r),
            Record::ProjectMember(r) => serde_json::to_value(r),
            Record::ProjectPrivateData(r) => serde_json::to_value(r),
            Record::Event(r) => serde_json::to_value(r),
            Record::Friendship(r) => serde_json::to_value(r),
            Record::FriendRequest(r) => serde_json::to_value(r),
            Record::Message(r) => serde_json::to_value(r),
        }
    }
}

/// Validate a raw row and turn it into an [`Entity`] of `kind`.
pub fn validate(kind: EntityKind, row: &Row) -> Result<Entity, SyncError> {
    let id = match row.get("id").and_then(serde_json::Value::as_str) {
        Some(id) if !id.is_empty() => EntityId::new(id),
        _ => {
            return Err(SyncError::Schema {
                kind,
                message: "row has no string `id`".to_string(),
            });
        }
    };

    let record = Record::from_row(kind, row)?;
    let normalized = record.to_json().map_err(|e| SyncError::Schema {
        kind,
        message: e.to_string(),
    })?;
    let serde_json::Value::Object(normalized) = normalized else {
        return Err(SyncError::Internal(format!(
            "{kind} record did not serialize to an object"
        )));
    };

    let mut fields = row_fields(&normalized);
    fields.remove("id");
    Ok(Entity::new(kind, id, fields))
}
