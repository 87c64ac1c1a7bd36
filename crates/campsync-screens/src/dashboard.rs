// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard summary: greeting, counters, recent projects, upcoming events.

use campsync_core::{EntityKind, Filter, QueryDescriptor, SortKey, SyncError};
use campsync_sync::schema::{Event, Project, ProjectMember, UserProfile};
use campsync_sync::SyncClient;
use chrono::NaiveDate;

use crate::one_of;

/// Greeting name when the profile has none.
pub const FALLBACK_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub active_projects: usize,
    pub upcoming_events: usize,
    pub skills: usize,
    pub network: &'static str,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub profile: Option<UserProfile>,
    pub stats: DashboardStats,
    pub recent_projects: Vec<Project>,
    pub upcoming_events: Vec<Event>,
}

impl Dashboard {
    pub fn greeting_name(&self) -> &str {
        self.profile
            .as_ref()
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_NAME)
    }
}

/// Load the dashboard for the signed-in user. Events dated before `today`
/// are not upcoming.
pub async fn load(client: &SyncClient, today: NaiveDate) -> Result<Dashboard, SyncError> {
    let me = client.identity().await?;
    let limits = &client.config().screens;

    let profile = client
        .fetch_as::<UserProfile>(
            &QueryDescriptor::new(EntityKind::User).filter(Filter::eq("id", me.user_id.as_str())),
        )
        .await?
        .into_iter()
        .next();

    let memberships: Vec<ProjectMember> = client
        .fetch_as(
            &QueryDescriptor::new(EntityKind::ProjectMember)
                .filter(Filter::eq("user_id", me.user_id.as_str())),
        )
        .await?;

    let mut recent_projects: Vec<Project> = if memberships.is_empty() {
        Vec::new()
    } else {
        client
            .fetch_as(
                &one_of(
                    EntityKind::Project,
                    "id",
                    memberships.iter().map(|m| m.project_id.as_str()),
                )
                .sort(SortKey::desc("created_at")),
            )
            .await?
    };
    recent_projects.truncate(limits.dashboard_recent_projects);

    let upcoming_events: Vec<Event> = client
        .fetch_as(
            &QueryDescriptor::new(EntityKind::Event)
                .filter(Filter::gte("date", today.format("%Y-%m-%d").to_string()))
                .sort(SortKey::asc("date"))
                .limit(limits.dashboard_upcoming_events),
        )
        .await?;

    let stats = DashboardStats {
        active_projects: memberships.len(),
        upcoming_events: upcoming_events.len(),
        skills: profile.as_ref().map_or(0, |p| p.skills.len()),
        network: "Growing",
    };

    Ok(Dashboard {
        profile,
        stats,
        recent_projects,
        upcoming_events,
    })
}
