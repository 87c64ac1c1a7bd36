// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sign-in and sign-up.
//!
//! Sign-up creates the account, then the user's profile row keyed by the new
//! user id. A throttled sign-up is reported with the configured retry-later
//! message; nothing here retries.

use campsync_core::{
    fields, Credentials, EntityKind, Identity, SignUpRequest, SyncError, Value,
};
use campsync_sync::schema::UserProfile;
use campsync_sync::SyncClient;
use tracing::info;

use crate::optional;

/// Shown next to a rate-limit error.
pub const RATE_LIMIT_TIP: &str = "Tip: If you already have an account, try signing in instead.";

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub name: String,
    pub college: String,
    pub year: String,
    pub department: String,
}

pub async fn sign_in(client: &SyncClient, email: &str, password: &str) -> Result<Identity, SyncError> {
    client
        .session()
        .sign_in(&Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        })
        .await
}

pub async fn sign_out(client: &SyncClient) -> Result<(), SyncError> {
    client.session().sign_out().await
}

/// Create an account and its profile. Returns the stored profile.
pub async fn sign_up(client: &SyncClient, form: &SignUpForm) -> Result<UserProfile, SyncError> {
    let auth = &client.config().auth;
    if form.password.chars().count() < auth.min_password_len {
        return Err(SyncError::InvalidInput(format!(
            "Passkey must be at least {} characters",
            auth.min_password_len
        )));
    }

    let request = SignUpRequest {
        email: form.email.trim().to_string(),
        password: form.password.clone(),
        metadata: fields! {
            "name" => form.name.trim(),
            "college" => form.college.trim(),
        },
    };
    let identity = client
        .session()
        .sign_up(&request)
        .await
        .map_err(|e| match e {
            SyncError::RateLimited { .. } => SyncError::RateLimited {
                message: auth.rate_limit_message.clone(),
            },
            other => other,
        })?;
    info!(user = %identity.user_id, "account created");

    let profile = client
        .insert(
            EntityKind::User,
            fields! {
                "id" => identity.user_id.as_str(),
                "email" => identity.email.as_str(),
                "name" => form.name.trim(),
                "college" => form.college.trim(),
                "year" => Value::from(optional(&form.year)),
                "department" => Value::from(optional(&form.department)),
            },
        )
        .await?;
    profile.decode()
}

/// Extra guidance to show with a sign-up error, if any.
pub fn hint(error: &SyncError) -> Option<&'static str> {
    error.is_rate_limited().then_some(RATE_LIMIT_TIP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_only_for_rate_limits() {
        let limited = SyncError::RateLimited {
            message: "slow down".into(),
        };
        assert_eq!(hint(&limited), Some(RATE_LIMIT_TIP));
        assert_eq!(hint(&SyncError::Unauthenticated), None);
    }
}
