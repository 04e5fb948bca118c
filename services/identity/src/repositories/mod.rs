//! Credential store port and its adapters

pub mod memory;
pub mod user;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewUser, PageRequest, Pagination, User, UserFilter};

pub use memory::InMemoryCredentialStore;
pub use user::PgCredentialStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule (email or phone number) was violated
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The row to update no longer exists
    #[error("User not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of user records.
///
/// Soft-deleted rows are invisible to every lookup, to uniqueness checks and
/// to listings. Lookups report a missing row as `Ok(None)`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    /// Persist every mutable field of `user`, bumping `updated_at`
    async fn update(&self, user: &User) -> StoreResult<User>;

    /// Persist `user` with `deleted_at` set
    async fn soft_delete(&self, user: &User) -> StoreResult<()>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>>;
    async fn find_by_email_and_code(&self, email: &str, code: &str) -> StoreResult<Option<User>>;
    async fn find_by_phone_and_code(
        &self,
        phone_number: &str,
        code: &str,
    ) -> StoreResult<Option<User>>;

    /// Filtered page of users, newest first
    async fn list_with_filter(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<User>, Pagination)>;
}
