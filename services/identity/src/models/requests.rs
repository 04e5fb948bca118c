//! Request and response payloads for the identity operations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PageRequest, Pagination, Role, UserResponse, UserSummary};
use crate::validation::{
    Validate, validate_email, validate_name, validate_password, validate_phone_number,
    validate_required,
};

/// Request for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Set by the role-scoped entry points, never read from the client
    #[serde(skip)]
    pub role: Option<Role>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), String> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(phone_number) = &self.phone_number {
            validate_phone_number(phone_number)?;
        }
        Ok(())
    }
}

/// Response for user registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
}

/// Request for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Role the client expects; recorded in logs, never used to gate access
    #[serde(default)]
    pub role: Option<Role>,
}

impl Validate for LoginRequest {
    // Presence only: a password that fails the policy is still just a wrong
    // password here.
    fn validate(&self) -> Result<(), String> {
        validate_email(&self.email)?;
        validate_required("Password", &self.password)
    }
}

/// Response for user login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for token refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
}

/// Request for changing the password
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub password: String,
    pub new_password: String,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), String> {
        validate_required("Password", &self.password)?;
        validate_password(&self.new_password)
    }
}

/// Response for changing the password
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateUserResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub verify_code_email: String,
}

impl Validate for VerifyEmailRequest {
    fn validate(&self) -> Result<(), String> {
        validate_required("Email", &self.email)?;
        validate_required("Verify code", &self.verify_code_email)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPhoneNumberRequest {
    pub phone_number: String,
    pub verify_code_phone_number: String,
}

impl Validate for VerifyPhoneNumberRequest {
    fn validate(&self) -> Result<(), String> {
        validate_required("Phone number", &self.phone_number)?;
        validate_required("Verify code", &self.verify_code_phone_number)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendVerifyEmailRequest {
    pub email: String,
}

impl Validate for ResendVerifyEmailRequest {
    fn validate(&self) -> Result<(), String> {
        validate_required("Email", &self.email)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendVerifyPhoneNumberRequest {
    pub phone_number: String,
}

impl Validate for ResendVerifyPhoneNumberRequest {
    fn validate(&self) -> Result<(), String> {
        validate_required("Phone number", &self.phone_number)
    }
}

/// Outcome message of the verification and resend operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub message: String,
}

impl VerifyResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Filters applied to user listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Case-insensitive substring of the display name
    pub name: Option<String>,
    /// Exact email
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Query parameters for user listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListUsersRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListUsersRequest {
    /// Split into a filter (blank values dropped) and a clamped page
    pub fn normalize(&self) -> (UserFilter, PageRequest) {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let filter = UserFilter {
            name: non_blank(&self.name),
            email: non_blank(&self.email),
            role: self.role,
        };
        (filter, PageRequest::new(self.page, self.limit))
    }

    /// Canonical query string of the normalized request.
    ///
    /// Requests that normalize to the same filter and page produce the same
    /// string, whichever transport they came from.
    pub fn canonical_query(&self) -> String {
        let (filter, page) = self.normalize();
        let mut pairs = vec![
            format!("limit={}", page.limit),
            format!("page={}", page.page),
        ];
        if let Some(name) = filter.name {
            pairs.push(format!("name={}", escape_query_value(&name)));
        }
        if let Some(email) = filter.email {
            pairs.push(format!("email={}", escape_query_value(&email)));
        }
        if let Some(role) = filter.role {
            pairs.push(format!("role={}", role));
        }
        pairs.join("&")
    }
}

// Keeps free-text filter values from forging extra query pairs.
fn escape_query_value(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

/// Response for user listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserSummary>,
    pub pagination: Pagination,
}

/// Request for soft-deleting a user
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserRequest {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl Validate for DeleteUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.id.is_nil() {
            return Err("User id is required".to_string());
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(phone_number) = &self.phone_number {
            validate_phone_number(phone_number)?;
        }
        Ok(())
    }
}
