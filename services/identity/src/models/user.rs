//! User model and its outbound representations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// User entity as persisted by the credential store.
///
/// Deliberately not `Serialize`: it carries the password hash and the live
/// verification codes. Convert to [`UserResponse`] or [`UserSummary`] before
/// anything leaves the service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub verify_code_email: String,
    pub approve_email: bool,
    pub verify_code_phone_number: Option<String>,
    pub approve_phone_number: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the row has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// New user creation payload. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub verify_code_email: String,
    pub verify_code_phone_number: Option<String>,
}

/// A user's own profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub approve_email: bool,
    pub approve_phone_number: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role,
            approve_email: user.approve_email,
            approve_phone_number: user.approve_phone_number,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Listing entry. Cached and served to any caller, so it only holds fields
/// that are not private to the listed user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
