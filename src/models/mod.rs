//! Shared data models: users and the summaries embedded in other responses

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// User model
///
/// Rows are created by the identity provider at signup; this service only
/// reads them, except for `bartr_count`, which the completion side effect
/// increments.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub image: Option<String>,
    pub role: UserRole,
    pub bartr_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
            UserRole::Guest => "GUEST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "USER" => Some(UserRole::User),
            "GUEST" => Some(UserRole::Guest),
            _ => None,
        }
    }
}

/// Sender/party identity embedded in bartr and message responses
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

/// Self-described profile details, one row per user at most
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub member_since: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public profile (GET /users/:id); the email address is never exposed
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
    pub bartr_count: i32,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub member_since: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Users without a profile row are members since signup
    pub fn new(user: User, profile: Option<Profile>) -> Self {
        let (bio, location, member_since) = match profile {
            Some(profile) => (profile.bio, profile.location, profile.member_since),
            None => (None, None, user.created_at),
        };

        Self {
            id: user.id,
            name: user.name,
            image: user.image,
            role: user.role,
            bartr_count: user.bartr_count,
            bio,
            location,
            member_since,
            created_at: user.created_at,
        }
    }
}
