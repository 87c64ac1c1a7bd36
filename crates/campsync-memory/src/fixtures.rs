// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seed data: a demo account, classmates, projects, events, friendships,
//! pending requests and a few conversations.
//!
//! Timestamps and event dates are relative to the moment of seeding, so the
//! dashboard always has upcoming events to show.

use campsync_core::{fields, EntityKind};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::platform::MemoryPlatform;

pub const DEMO_EMAIL: &str = "demo@campus.edu";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_USER_ID: &str = "user-demo";

/// Password of every seeded account other than the demo one.
pub const FIXTURE_PASSWORD: &str = "password123";

struct Student {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    college: &'static str,
}

const FRIENDS: [Student; 4] = [
    Student { id: "user-alex", name: "Alex Johnson", email: "alex@example.com", college: "MIT" },
    Student { id: "user-sarah", name: "Sarah Chen", email: "sarah@example.com", college: "Stanford" },
    Student { id: "user-michael", name: "Michael Brown", email: "michael@example.com", college: "Harvard" },
    Student { id: "user-emily", name: "Emily Davis", email: "emily@example.com", college: "UC Berkeley" },
];

const REQUESTERS: [Student; 2] = [
    Student { id: "user-david", name: "David Wilson", email: "david@example.com", college: "Yale" },
    Student { id: "user-jessica", name: "Jessica Martinez", email: "jessica@example.com", college: "Princeton" },
];

const STRANGERS: [Student; 3] = [
    Student { id: "user-ryan", name: "Ryan Taylor", email: "ryan@example.com", college: "Cornell" },
    Student { id: "user-olivia", name: "Olivia White", email: "olivia@example.com", college: "UCLA" },
    Student { id: "user-james", name: "James Anderson", email: "james@example.com", college: "NYU" },
];

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn chat_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

fn put(platform: &MemoryPlatform, kind: EntityKind, value: serde_json::Value) {
    let serde_json::Value::Object(row) = value else {
        return;
    };
    if let Err(e) = platform.insert_row(kind, row) {
        warn!(kind = %kind, error = %e, "fixture row rejected");
    }
}

pub(crate) fn seed(platform: &MemoryPlatform) {
    let now = Utc::now();
    let today = now.date_naive();
    let day = |offset: i64| (today + Duration::days(offset)).format("%Y-%m-%d").to_string();
    let ago = |secs: i64| stamp(now - Duration::seconds(secs));

    platform.register(
        DEMO_USER_ID,
        DEMO_EMAIL,
        DEMO_PASSWORD,
        fields! { "name" => "Demo Student" },
    );
    put(platform, EntityKind::User, json!({
        "id": DEMO_USER_ID,
        "email": DEMO_EMAIL,
        "name": "Demo Student",
        "college": "State University",
        "year": "3rd Year",
        "department": "Computer Science",
        "skills": ["Rust", "React", "Machine Learning"],
        "created_at": ago(30 * 86_400),
    }));

    for student in FRIENDS.iter().chain(&REQUESTERS).chain(&STRANGERS) {
        platform.register(
            student.id,
            student.email,
            FIXTURE_PASSWORD,
            fields! { "name" => student.name },
        );
        put(platform, EntityKind::User, json!({
            "id": student.id,
            "email": student.email,
            "name": student.name,
            "college": student.college,
            "skills": [],
            "avatar_url": null,
            "created_at": ago(20 * 86_400),
        }));
    }

    for (n, friend) in FRIENDS.iter().enumerate() {
        // One friendship stored the other way round, as it would be when the
        // friend accepted the demo user's request.
        let (user1, user2) = if n == 2 {
            (friend.id, DEMO_USER_ID)
        } else {
            (DEMO_USER_ID, friend.id)
        };
        put(platform, EntityKind::Friendship, json!({
            "id": format!("f{}", n + 1),
            "user1_id": user1,
            "user2_id": user2,
            "status": "accepted",
            "created_at": ago(10 * 86_400),
        }));
    }

    for (n, requester) in REQUESTERS.iter().enumerate() {
        put(platform, EntityKind::FriendRequest, json!({
            "id": format!("req{}", n + 1),
            "sender_id": requester.id,
            "receiver_id": DEMO_USER_ID,
            "status": "pending",
            "created_at": ago(86_400),
        }));
    }

    let conversations: [(&str, &[(bool, &str, i64)]); 4] = [
        ("user-alex", &[
            (false, "Hey! How are you doing?", 3_600),
            (true, "I'm doing great! Thanks for asking. How about you?", 3_300),
            (false, "I'm good too! Working on a new project. Want to collaborate?", 3_000),
        ]),
        ("user-sarah", &[
            (false, "Hi! Are you going to the hackathon this weekend?", 7_200),
            (true, "Yes! I am. Are you participating too?", 6_900),
            (false, "Yes! Maybe we can form a team?", 6_600),
        ]),
        ("user-michael", &[
            (true, "Hey Michael! How did the exam go?", 1_800),
            (false, "It went well! Thanks for asking. How about yours?", 1_500),
        ]),
        ("user-emily", &[(false, "Hello! 👋", 900)]),
    ];
    let mut message_no = 0;
    for (friend, lines) in conversations {
        let chat = chat_id(DEMO_USER_ID, friend);
        for (from_demo, content, secs) in lines {
            message_no += 1;
            let (sender, receiver) = if *from_demo {
                (DEMO_USER_ID, friend)
            } else {
                (friend, DEMO_USER_ID)
            };
            put(platform, EntityKind::Message, json!({
                "id": format!("msg{message_no}"),
                "chat_id": chat,
                "sender_id": sender,
                "receiver_id": receiver,
                "content": content,
                "created_at": ago(*secs),
            }));
        }
    }

    let projects = [
        (
            "proj-campus-connect",
            "Campus Connect",
            "A social board for finding study groups and side-project partners.",
            &["Web", "Social"][..],
            &["React", "Rust"][..],
            "Frontend developer",
            3,
            &[(DEMO_USER_ID, "owner"), ("user-alex", "member")][..],
        ),
        (
            "proj-study-buddy",
            "Study Buddy AI",
            "Flashcards generated from lecture notes.",
            &["AI", "Education"][..],
            &["Python", "Machine Learning"][..],
            "ML engineer",
            2,
            &[("user-sarah", "owner"), (DEMO_USER_ID, "member")][..],
        ),
        (
            "proj-green-route",
            "Green Route",
            "Low-emission commute planner for the campus shuttle network.",
            &["Sustainability", "Maps"][..],
            &["Kotlin"][..],
            "Designer",
            1,
            &[("user-michael", "owner")][..],
        ),
    ];
    let mut member_no = 0;
    for (id, title, description, tags, skills, looking_for, days_ago, members) in projects {
        put(platform, EntityKind::Project, json!({
            "id": id,
            "title": title,
            "description": description,
            "tags": tags,
            "required_skills": skills,
            "looking_for": looking_for,
            "created_at": ago(days_ago * 86_400),
        }));
        for (user, role) in members {
            member_no += 1;
            put(platform, EntityKind::ProjectMember, json!({
                "id": format!("pm{member_no}"),
                "project_id": id,
                "user_id": user,
                "role": role,
            }));
        }
    }
    put(platform, EntityKind::ProjectPrivateData, json!({
        "id": "ppd1",
        "project_id": "proj-campus-connect",
        "repo_link": "https://github.com/campus/campus-connect",
    }));

    let events = [
        ("evt-rust-workshop", "Intro to Rust Workshop", "Workshop", 3, &["Systems"][..], "Engineering Hall 101", "Systems Club", DEMO_USER_ID),
        ("evt-hackathon", "Campus Hackathon 2026", "Hackathon", 7, &["AI", "Web"][..], "Student Center", "ACM Student Chapter", "user-sarah"),
        ("evt-ml-competition", "ML Model Competition", "Competition", 20, &["AI", "Data Science"][..], "Online", "Data Science Society", "user-alex"),
        ("evt-career-seminar", "Career Fair Seminar", "Seminar", -10, &["Career"][..], "Auditorium", "Career Services", "user-michael"),
    ];
    for (id, title, event_type, in_days, domains, location, organizer, created_by) in events {
        put(platform, EntityKind::Event, json!({
            "id": id,
            "title": title,
            "description": format!("{title}, hosted by {organizer}."),
            "event_type": event_type,
            "date": day(in_days),
            "domains": domains,
            "location": location,
            "organizer": organizer,
            "registration_link": format!("https://events.campus.edu/{id}"),
            "created_by": created_by,
        }));
    }

    debug!("seeded fixtures");
}
