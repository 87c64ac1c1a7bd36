// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Project listing and creation.

use campsync_core::{fields, EntityKind, Filter, QueryDescriptor, SortKey, SyncError, Value};
use campsync_sync::schema::{Project, ProjectMember, ProjectPrivateData};
use campsync_sync::SyncClient;
use tracing::debug;

use crate::{one_of, optional, profiles, split_list};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberView {
    pub user_id: String,
    pub role: String,
    /// Absent when the member's profile could not be found.
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectCard {
    pub project: Project,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    /// Comma-separated.
    pub tags: String,
    /// Comma-separated.
    pub required_skills: String,
    pub looking_for: String,
    pub repo_link: String,
}

/// Every project, newest first, with its members.
pub async fn list(client: &SyncClient) -> Result<Vec<ProjectCard>, SyncError> {
    let projects: Vec<Project> = client
        .fetch_as(&QueryDescriptor::new(EntityKind::Project).sort(SortKey::desc("created_at")))
        .await?;
    if projects.is_empty() {
        return Ok(Vec::new());
    }

    let members: Vec<ProjectMember> = client
        .fetch_as(&one_of(
            EntityKind::ProjectMember,
            "project_id",
            projects.iter().map(|p| p.id.as_str()),
        ))
        .await?;
    let names = profiles(client, members.iter().map(|m| m.user_id.as_str())).await?;

    Ok(projects
        .into_iter()
        .map(|project| {
            let members = members
                .iter()
                .filter(|m| m.project_id == project.id)
                .map(|m| {
                    let profile = names.get(&m.user_id);
                    MemberView {
                        user_id: m.user_id.clone(),
                        role: m.role.clone(),
                        name: profile.map(|p| p.name.clone()),
                        avatar_url: profile.and_then(|p| p.avatar_url.clone()),
                    }
                })
                .collect();
            ProjectCard { project, members }
        })
        .collect())
}

/// Create a project owned by the signed-in user, plus its private repo link
/// when one is given.
pub async fn create(client: &SyncClient, form: &NewProject) -> Result<Project, SyncError> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(SyncError::InvalidInput("Title is required".into()));
    }
    let me = client.identity().await?;

    let project: Project = client
        .insert(
            EntityKind::Project,
            fields! {
                "title" => title,
                "description" => Value::from(optional(&form.description)),
                "tags" => split_list(&form.tags),
                "required_skills" => split_list(&form.required_skills),
                "looking_for" => Value::from(optional(&form.looking_for)),
            },
        )
        .await?
        .decode()?;
    debug!(project = %project.id, "project created");

    client
        .insert(
            EntityKind::ProjectMember,
            fields! {
                "project_id" => project.id.as_str(),
                "user_id" => me.user_id.as_str(),
                "role" => "owner",
            },
        )
        .await?;

    if let Some(repo_link) = optional(&form.repo_link) {
        client
            .insert(
                EntityKind::ProjectPrivateData,
                fields! {
                    "project_id" => project.id.as_str(),
                    "repo_link" => repo_link,
                },
            )
            .await?;
    }

    Ok(project)
}

/// The private repo link of a project, if one was recorded.
pub async fn private_data(
    client: &SyncClient,
    project_id: &str,
) -> Result<Option<ProjectPrivateData>, SyncError> {
    Ok(client
        .fetch_as::<ProjectPrivateData>(
            &QueryDescriptor::new(EntityKind::ProjectPrivateData)
                .filter(Filter::eq("project_id", project_id)),
        )
        .await?
        .into_iter()
        .next())
}
