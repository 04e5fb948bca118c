//! In-memory credential store

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{NewUser, PageRequest, Pagination, User, UserFilter};

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live(user: &User) -> bool {
    !user.is_deleted()
}

// Uniqueness among live rows, ignoring the row being written.
fn check_unique(
    users: &HashMap<Uuid, User>,
    id: Uuid,
    email: &str,
    phone_number: Option<&str>,
) -> StoreResult<()> {
    for other in users.values().filter(|u| live(u) && u.id != id) {
        if other.email == email {
            return Err(StoreError::Conflict(format!("email {} already exists", email)));
        }
        if let (Some(phone), Some(other_phone)) = (phone_number, other.phone_number.as_deref()) {
            if phone == other_phone {
                return Err(StoreError::Conflict(format!(
                    "phone number {} already exists",
                    phone
                )));
            }
        }
    }
    Ok(())
}

fn matches(user: &User, filter: &UserFilter) -> bool {
    if let Some(name) = &filter.name {
        let needle = name.to_lowercase();
        match &user.name {
            Some(user_name) if user_name.to_lowercase().contains(&needle) => {}
            _ => return false,
        }
    }
    if let Some(email) = &filter.email {
        if &user.email != email {
            return false;
        }
    }
    if let Some(role) = filter.role {
        if user.role != role {
            return false;
        }
    }
    true
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let id = Uuid::new_v4();
        check_unique(&users, id, &new_user.email, new_user.phone_number.as_deref())?;

        let now = Utc::now();
        let user = User {
            id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            phone_number: new_user.phone_number,
            role: new_user.role,
            verify_code_email: new_user.verify_code_email,
            approve_email: false,
            verify_code_phone_number: new_user.verify_code_phone_number,
            approve_phone_number: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        match users.get(&user.id) {
            Some(existing) if live(existing) => {}
            _ => return Err(StoreError::NotFound),
        }
        check_unique(&users, user.id, &user.email, user.phone_number.as_deref())?;

        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn soft_delete(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        match users.get(&user.id) {
            Some(existing) if live(existing) => {}
            _ => return Err(StoreError::NotFound),
        }

        let now = Utc::now();
        let mut deleted = user.clone();
        deleted.updated_at = now;
        deleted.deleted_at = Some(now);
        users.insert(deleted.id, deleted);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| live(u)).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| live(u) && u.email == email)
            .cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| live(u) && u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| live(u) && u.email == email && u.verify_code_email == code)
            .cloned())
    }

    async fn find_by_phone_and_code(
        &self,
        phone_number: &str,
        code: &str,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                live(u)
                    && u.phone_number.as_deref() == Some(phone_number)
                    && u.verify_code_phone_number.as_deref() == Some(code)
            })
            .cloned())
    }

    async fn list_with_filter(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<User>, Pagination)> {
        let users = self.users.read().await;
        let mut found: Vec<&User> = users
            .values()
            .filter(|u| live(u) && matches(u, filter))
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = found.len() as u64;
        let items = found
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((items, Pagination::new(page, total)))
    }
}
