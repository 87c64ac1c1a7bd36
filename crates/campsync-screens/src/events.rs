// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event listing with type and domain filters, and event creation.

use campsync_core::{fields, EntityKind, Filter, QueryDescriptor, SortKey, SyncError, Value};
use campsync_sync::schema::Event;
use campsync_sync::SyncClient;
use chrono::NaiveDate;

use crate::{optional, split_list};

pub const ALL_TYPES: &str = "All Types";
pub const ALL_DOMAINS: &str = "All Domains";

pub const EVENT_TYPES: [&str; 5] = ["Hackathon", "Workshop", "Competition", "Seminar", "Other"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: String,
    pub domain: String,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            event_type: ALL_TYPES.to_string(),
            domain: ALL_DOMAINS.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventList {
    pub events: Vec<Event>,
    /// Distinct domains of the type-filtered events, sorted. The domain
    /// filter does not narrow this list.
    pub domain_options: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_type: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Comma-separated.
    pub domains: String,
    pub location: String,
    pub organizer: String,
    pub registration_link: String,
}

fn descriptor(filter: &EventFilter) -> QueryDescriptor {
    let query = QueryDescriptor::new(EntityKind::Event).sort(SortKey::asc("date"));
    if filter.event_type == ALL_TYPES {
        query
    } else {
        query.filter(Filter::eq("event_type", filter.event_type.as_str()))
    }
}

pub async fn list(client: &SyncClient, filter: &EventFilter) -> Result<EventList, SyncError> {
    let events: Vec<Event> = client.fetch_as(&descriptor(filter)).await?;

    let mut domain_options: Vec<String> = events
        .iter()
        .flat_map(|e| e.domains.iter())
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    domain_options.sort();
    domain_options.dedup();

    let events = if filter.domain == ALL_DOMAINS {
        events
    } else {
        events
            .into_iter()
            .filter(|e| e.domains.iter().any(|d| d.trim() == filter.domain))
            .collect()
    };

    Ok(EventList {
        events,
        domain_options,
    })
}

/// Create an event attributed to the signed-in user.
pub async fn create(client: &SyncClient, form: &NewEvent) -> Result<Event, SyncError> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(SyncError::InvalidInput("Title is required".into()));
    }
    let event_type = form.event_type.trim();
    if !EVENT_TYPES.contains(&event_type) {
        return Err(SyncError::InvalidInput(format!(
            "unknown event type `{event_type}`"
        )));
    }
    let date = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d")
        .map_err(|_| SyncError::InvalidInput(format!("invalid date `{}`", form.date.trim())))?;

    let me = client.identity().await?;
    client
        .insert(
            EntityKind::Event,
            fields! {
                "title" => title,
                "description" => Value::from(optional(&form.description)),
                "event_type" => event_type,
                "date" => date.format("%Y-%m-%d").to_string(),
                "domains" => split_list(&form.domains),
                "location" => Value::from(optional(&form.location)),
                "organizer" => Value::from(optional(&form.organizer)),
                "registration_link" => Value::from(optional(&form.registration_link)),
                "created_by" => me.user_id.as_str(),
            },
        )
        .await?
        .decode()
}
