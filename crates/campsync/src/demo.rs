// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `campsync demo` command implementation.
//!
//! Starts a seeded in-memory platform, signs in, and prints what each screen
//! would show. Colors are used only on a terminal and without `--plain`.

use std::io::IsTerminal;
use std::sync::Arc;

use campsync_config::SyncConfig;
use campsync_core::SyncError;
use campsync_memory::MemoryPlatform;
use campsync_screens::events::EventFilter;
use campsync_screens::{auth, dashboard, events, procomm, projects};
use campsync_sync::SyncClient;
use chrono::Utc;
use tracing::info;

struct Printer {
    use_color: bool,
}

impl Printer {
    fn heading(&self, title: &str) {
        println!();
        if self.use_color {
            use colored::Colorize;
            println!("  {}", title.bold());
        } else {
            println!("  {title}");
        }
        println!("  {}", "-".repeat(50));
    }

    fn item(&self, label: &str, detail: &str) {
        if self.use_color {
            use colored::Colorize;
            println!("    {:<28} {}", label, detail.dimmed());
        } else {
            println!("    {label:<28} {detail}");
        }
    }
}

/// Run the `campsync demo` command.
pub async fn run(
    mut config: SyncConfig,
    email: &str,
    password: &str,
    plain: bool,
) -> Result<(), SyncError> {
    let out = Printer {
        use_color: !plain && std::io::stdout().is_terminal(),
    };

    config.memory.seed_fixtures = true;
    let platform = Arc::new(MemoryPlatform::new(config.memory.clone()));
    let client = SyncClient::connect(config, platform).await?;

    let me = auth::sign_in(&client, email, password).await?;
    info!(user = %me.user_id, "signed in");

    let board = dashboard::load(&client, Utc::now().date_naive()).await?;
    out.heading(&format!("Welcome back, {}", board.greeting_name()));
    out.item("Active projects", &board.stats.active_projects.to_string());
    out.item("Upcoming events", &board.stats.upcoming_events.to_string());
    out.item("Skills", &board.stats.skills.to_string());
    out.item("Network", board.stats.network);

    out.heading("Projects");
    for card in projects::list(&client).await? {
        let members: Vec<&str> = card
            .members
            .iter()
            .map(|m| m.name.as_deref().unwrap_or(m.user_id.as_str()))
            .collect();
        out.item(&card.project.title, &members.join(", "));
    }

    out.heading("Events");
    for event in events::list(&client, &EventFilter::default()).await?.events {
        out.item(
            &event.title,
            &format!("{} · {}", event.event_type, event.date),
        );
    }

    out.heading("Friends");
    let friends = procomm::friends(&client).await?;
    for friend in &friends {
        out.item(&friend.name, friend.college.as_deref().unwrap_or(""));
    }
    for request in procomm::incoming_requests(&client).await? {
        let from = request
            .other
            .as_ref()
            .map_or(request.request.sender_id.as_str(), |p| p.name.as_str());
        out.item(from, "wants to connect");
    }

    if let Some(friend) = friends.first() {
        out.heading(&format!("Chat with {}", friend.name));
        for message in procomm::conversation(&client, &friend.id).await? {
            let who = if message.sender_id == me.user_id.as_str() {
                "You"
            } else {
                friend.name.as_str()
            };
            out.item(who, &message.content);
        }
    }
    println!();

    auth::sign_out(&client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use campsync_memory::fixtures::{DEMO_EMAIL, DEMO_PASSWORD};

    #[tokio::test]
    async fn demo_runs_against_seeded_platform() {
        run(SyncConfig::default(), DEMO_EMAIL, DEMO_PASSWORD, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn demo_rejects_bad_credentials() {
        let err = run(SyncConfig::default(), DEMO_EMAIL, "wrong", true)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }
}
