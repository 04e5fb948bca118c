//! PostgreSQL credential store

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{error, info};
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::models::{NewUser, PageRequest, Pagination, Role, User, UserFilter};

const USER_COLUMNS: &str = "id, email, password_hash, name, phone_number, role, \
     verify_code_email, approve_email, verify_code_phone_number, approve_phone_number, \
     created_at, updated_at, deleted_at";

/// User repository backed by the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, binds: &[&str]) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} AND deleted_at IS NULL",
            USER_COLUMNS, clause
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    let role = role.parse::<Role>().map_err(StoreError::Unexpected)?;

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        phone_number: row.try_get("phone_number")?,
        role,
        verify_code_email: row.try_get("verify_code_email")?,
        approve_email: row.try_get("approve_email")?,
        verify_code_phone_number: row.try_get("verify_code_phone_number")?,
        approve_phone_number: row.try_get("approve_phone_number")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

// Unique violations surface as Conflict; everything else stays a database error.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("users").to_string();
            return StoreError::Conflict(constraint);
        }
    }
    error!("Failed to write user: {}", e);
    StoreError::Database(e)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.email);

        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, name, phone_number, role,
                               verify_code_email, verify_code_phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.name)
            .bind(&new_user.phone_number)
            .bind(new_user.role.as_str())
            .bind(&new_user.verify_code_email)
            .bind(&new_user.verify_code_phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        user_from_row(&row)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, name = $4, phone_number = $5, role = $6,
                verify_code_email = $7, approve_email = $8,
                verify_code_phone_number = $9, approve_phone_number = $10,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.phone_number)
            .bind(user.role.as_str())
            .bind(&user.verify_code_email)
            .bind(user.approve_email)
            .bind(&user.verify_code_phone_number)
            .bind(user.approve_phone_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn soft_delete(&self, user: &User) -> StoreResult<()> {
        info!("Soft-deleting user: {}", user.id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, phone_number = $3, updated_at = NOW(), deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone_number)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.fetch_one_where("email = $1", &[email]).await
    }

    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        self.fetch_one_where("phone_number = $1", &[phone_number])
            .await
    }

    async fn find_by_email_and_code(&self, email: &str, code: &str) -> StoreResult<Option<User>> {
        self.fetch_one_where("email = $1 AND verify_code_email = $2", &[email, code])
            .await
    }

    async fn find_by_phone_and_code(
        &self,
        phone_number: &str,
        code: &str,
    ) -> StoreResult<Option<User>> {
        self.fetch_one_where(
            "phone_number = $1 AND verify_code_phone_number = $2",
            &[phone_number, code],
        )
        .await
    }

    async fn list_with_filter(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<User>, Pagination)> {
        const FILTER: &str = r#"
            deleted_at IS NULL
              AND ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\')
              AND ($2::TEXT IS NULL OR email = $2)
              AND ($3::TEXT IS NULL OR role = $3)
        "#;
        let name = filter.name.as_deref().map(contains_pattern);
        let role = filter.role.map(|r| r.as_str());

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM users WHERE {}", FILTER))
            .bind(&name)
            .bind(&filter.email)
            .bind(role)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, id LIMIT $4 OFFSET $5",
            USER_COLUMNS, FILTER
        );
        let rows = sqlx::query(&sql)
            .bind(&name)
            .bind(&filter.email)
            .bind(role)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let users = rows.iter().map(user_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok((users, Pagination::new(page, total.max(0) as u64)))
    }
}

/// `ILIKE` pattern matching `needle` literally anywhere in the value
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
