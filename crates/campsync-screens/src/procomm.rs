// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Friends, friend requests, user search and one-to-one chat.
//!
//! Messages are ordinary `message` entities ordered by the timestamp the
//! platform assigns on insert. A conversation is re-read, not pushed.

use campsync_core::{fields, EntityId, EntityKind, Filter, QueryDescriptor, SortKey, SyncError};
use campsync_sync::schema::{ChatMessage, FriendRequest, Friendship, UserProfile};
use campsync_sync::SyncClient;
use tracing::debug;

use crate::profiles;

const PENDING: &str = "pending";
const ACCEPTED: &str = "accepted";
const REJECTED: &str = "rejected";

/// A pending request with the profile of the other party.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub request: FriendRequest,
    pub other: Option<UserProfile>,
}

/// Conversation id for two users: their ids sorted and joined by `_`.
pub fn chat_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

/// Profiles of everyone with an accepted friendship with the signed-in
/// user, on either side, sorted by name.
pub async fn friends(client: &SyncClient) -> Result<Vec<UserProfile>, SyncError> {
    let me = client.identity().await?;
    let me = me.user_id.as_str();

    let mut friendships: Vec<Friendship> = Vec::new();
    for side in ["user1_id", "user2_id"] {
        friendships.extend(
            client
                .fetch_as::<Friendship>(
                    &QueryDescriptor::new(EntityKind::Friendship)
                        .filter(Filter::eq(side, me))
                        .filter(Filter::eq("status", ACCEPTED)),
                )
                .await?,
        );
    }

    let others: Vec<&str> = friendships.iter().filter_map(|f| f.other(me)).collect();
    let mut profiles: Vec<UserProfile> = profiles(client, others).await?.into_values().collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(profiles)
}

async fn pending_requests(
    client: &SyncClient,
    side: &str,
    other_side: fn(&FriendRequest) -> &str,
) -> Result<Vec<RequestView>, SyncError> {
    let me = client.identity().await?;
    let requests: Vec<FriendRequest> = client
        .fetch_as(
            &QueryDescriptor::new(EntityKind::FriendRequest)
                .filter(Filter::eq(side, me.user_id.as_str()))
                .filter(Filter::eq("status", PENDING))
                .sort(SortKey::desc("created_at")),
        )
        .await?;
    let mut names = profiles(client, requests.iter().map(other_side)).await?;
    Ok(requests
        .into_iter()
        .map(|request| {
            let other = names.remove(other_side(&request));
            RequestView { request, other }
        })
        .collect())
}

/// Pending requests sent to the signed-in user, newest first.
pub async fn incoming_requests(client: &SyncClient) -> Result<Vec<RequestView>, SyncError> {
    pending_requests(client, "receiver_id", |r| r.sender_id.as_str()).await
}

/// Pending requests the signed-in user has sent, newest first.
pub async fn outgoing_requests(client: &SyncClient) -> Result<Vec<RequestView>, SyncError> {
    pending_requests(client, "sender_id", |r| r.receiver_id.as_str()).await
}

/// Users whose name contains `term`, ignoring case. A blank term finds
/// nobody, and the signed-in user is never listed.
pub async fn search_users(client: &SyncClient, term: &str) -> Result<Vec<UserProfile>, SyncError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let me = client.identity().await?;
    let users: Vec<UserProfile> = client
        .fetch_as(
            &QueryDescriptor::new(EntityKind::User)
                .filter(Filter::text_search("name", term))
                .sort(SortKey::asc("name")),
        )
        .await?;
    Ok(users
        .into_iter()
        .filter(|u| u.id != me.user_id.as_str())
        .collect())
}

pub async fn send_request(client: &SyncClient, receiver_id: &str) -> Result<FriendRequest, SyncError> {
    let me = client.identity().await?;
    if receiver_id == me.user_id.as_str() {
        return Err(SyncError::InvalidInput(
            "cannot send a friend request to yourself".into(),
        ));
    }
    client
        .insert(
            EntityKind::FriendRequest,
            fields! {
                "sender_id" => me.user_id.as_str(),
                "receiver_id" => receiver_id,
                "status" => PENDING,
            },
        )
        .await?
        .decode()
}

/// Accept a request: mark it accepted and record the friendship.
pub async fn accept_request(
    client: &SyncClient,
    request: &FriendRequest,
) -> Result<Friendship, SyncError> {
    client
        .update(
            EntityKind::FriendRequest,
            &EntityId::new(request.id.as_str()),
            fields! { "status" => ACCEPTED },
        )
        .await?;
    let friendship: Friendship = client
        .insert(
            EntityKind::Friendship,
            fields! {
                "user1_id" => request.sender_id.as_str(),
                "user2_id" => request.receiver_id.as_str(),
                "status" => ACCEPTED,
            },
        )
        .await?
        .decode()?;
    debug!(request = %request.id, friendship = %friendship.id, "friend request accepted");
    Ok(friendship)
}

pub async fn reject_request(
    client: &SyncClient,
    request: &FriendRequest,
) -> Result<FriendRequest, SyncError> {
    client
        .update(
            EntityKind::FriendRequest,
            &EntityId::new(request.id.as_str()),
            fields! { "status" => REJECTED },
        )
        .await?
        .decode()
}

/// Messages between the signed-in user and `other`, oldest first.
pub async fn conversation(client: &SyncClient, other: &str) -> Result<Vec<ChatMessage>, SyncError> {
    let me = client.identity().await?;
    client
        .fetch_as(
            &QueryDescriptor::new(EntityKind::Message)
                .filter(Filter::eq("chat_id", chat_id(me.user_id.as_str(), other)))
                .sort(SortKey::asc("created_at")),
        )
        .await
}

/// Send `content` to `receiver_id`. Blank messages are not sent.
pub async fn send_message(
    client: &SyncClient,
    receiver_id: &str,
    content: &str,
) -> Result<Option<ChatMessage>, SyncError> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(None);
    }
    let me = client.identity().await?;
    let me = me.user_id.as_str();
    let message = client
        .insert(
            EntityKind::Message,
            fields! {
                "chat_id" => chat_id(me, receiver_id),
                "sender_id" => me,
                "receiver_id" => receiver_id,
                "content" => content,
            },
        )
        .await?
        .decode()?;
    Ok(Some(message))
}
