// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Screen view-models for Campsync.
//!
//! Each module loads what one screen shows and performs the writes it
//! offers, through a [`campsync_sync::SyncClient`] passed in by the caller.
//! Nothing here renders; results are plain typed records.

pub mod auth;
pub mod dashboard;
pub mod events;
pub mod procomm;
pub mod projects;

use std::collections::HashMap;

use campsync_core::{EntityKind, Filter, QueryDescriptor, SyncError, Value};
use campsync_sync::schema::UserProfile;
use campsync_sync::SyncClient;

/// Split a comma-separated form field into trimmed, non-empty items.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None` for blank form input.
pub(crate) fn optional(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Descriptor matching `field` against a set of identifiers. The identifiers
/// are sorted so equal sets give equal descriptors.
pub(crate) fn one_of<'a>(
    kind: EntityKind,
    field: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> QueryDescriptor {
    let mut ids: Vec<&str> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    QueryDescriptor::new(kind).filter(Filter::one_of(
        field,
        ids.into_iter().map(Value::from).collect(),
    ))
}

/// Profiles for the given user ids, keyed by id.
pub(crate) async fn profiles<'a>(
    client: &SyncClient,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, UserProfile>, SyncError> {
    let ids: Vec<&str> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users: Vec<UserProfile> = client
        .fetch_as(&one_of(EntityKind::User, "id", ids))
        .await?;
    Ok(users.into_iter().map(|u| (u.id.clone(), u)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" Rust, React ,, Machine Learning ,"),
            vec!["Rust", "React", "Machine Learning"]
        );
        assert!(split_list("   ").is_empty());
    }

    #[test]
    fn one_of_ignores_order_and_duplicates() {
        assert_eq!(
            one_of(EntityKind::User, "id", ["b", "a", "b"]),
            one_of(EntityKind::User, "id", ["a", "b"])
        );
    }

    #[test]
    fn optional_maps_blank_to_none() {
        assert_eq!(optional("  "), None);
        assert_eq!(optional(" CSE "), Some("CSE".to_string()));
    }
}
