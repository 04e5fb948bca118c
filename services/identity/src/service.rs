//! Identity operations: registration, login, password change, verification
//! codes, listing and soft delete.
//!
//! The service holds no locks and no state of its own. Every collaborator is
//! injected, so the same instance can back the HTTP and RPC listeners.

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{IdentityError, IdentityResult},
    jwt::JwtService,
    models::{
        DeleteUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, LoginResponse,
        NewUser, RefreshTokenResponse, RegisterRequest, ResendVerifyEmailRequest,
        ResendVerifyPhoneNumberRequest, UpdateUserRequest, UpdateUserResponse, User,
        UserResponse, UserSummary, VerifyEmailRequest, VerifyPhoneNumberRequest, VerifyResponse,
    },
    password::PasswordHasher,
    repositories::CredentialStore,
    validation::Validate,
    verification::{Channel, CodeGenerator},
};

pub const VERIFICATION_SUCCESSFUL: &str = "Verification successful";
pub const RESEND_SUCCESSFUL: &str = "Resend Verify code is successful";
pub const PASSWORD_UPDATED: &str = "Password updated successfully";

fn validate(request: &impl Validate) -> IdentityResult<()> {
    request.validate().map_err(IdentityError::Validation)
}

fn user_not_found() -> IdentityError {
    IdentityError::NotFound("User not found".to_string())
}

pub struct IdentityService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: JwtService,
    codes: Arc<dyn CodeGenerator>,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: JwtService,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            codes,
        }
    }

    // Argon2 is CPU bound; keep it off the async workers.
    async fn hash_password(&self, password: &str) -> IdentityResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| IdentityError::Internal(e.to_string()))?
            .map_err(|e| IdentityError::Internal(e.to_string()))
    }

    /// Verify against the stored hash, or burn the same work when there is
    /// no user so both failures take as long.
    async fn verify_password(&self, password: &str, user: Option<&User>) -> IdentityResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored_hash = user.map(|u| u.password_hash.clone());
        tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => {
                hasher.verify_dummy(&password);
                false
            }
        })
        .await
        .map_err(|e| IdentityError::Internal(e.to_string()))
    }

    async fn deliver(&self, channel: Channel, destination: &str, code: &str) {
        if let Err(e) = self.codes.send(channel, destination, code).await {
            warn!(%channel, "Failed to deliver verification code: {}", e);
        }
    }

    fn issue_access_token(&self, user: &User) -> IdentityResult<String> {
        self.tokens.generate_access_token(user).map_err(|e| {
            error!("Failed to generate access token: {}", e);
            IdentityError::Internal(e.to_string())
        })
    }

    #[tracing::instrument(name = "IdentityService::register", skip_all, fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> IdentityResult<User> {
        validate(&req)?;

        let password_hash = self.hash_password(&req.password).await?;
        let verify_code_phone_number = req
            .phone_number
            .as_ref()
            .map(|_| self.codes.generate(Channel::Phone));

        let new_user = NewUser {
            email: req.email,
            password_hash,
            name: req.name,
            phone_number: req.phone_number,
            role: req.role.unwrap_or_default(),
            verify_code_email: self.codes.generate(Channel::Email),
            verify_code_phone_number,
        };

        let user = self.store.create(new_user).await.map_err(|e| {
            error!("Failed to create user: {}", e);
            IdentityError::from(e)
        })?;
        info!(user_id = %user.id, "User registered");

        self.deliver(Channel::Email, &user.email, &user.verify_code_email)
            .await;
        if let (Some(phone), Some(code)) = (&user.phone_number, &user.verify_code_phone_number) {
            self.deliver(Channel::Phone, phone, code).await;
        }

        Ok(user)
    }

    #[tracing::instrument(name = "IdentityService::login", skip_all, fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> IdentityResult<LoginResponse> {
        validate(&req)?;
        if let Some(role) = req.role {
            info!(%role, "Login role hint");
        }

        let user = self.store.find_by_email(&req.email).await?;
        if !self.verify_password(&req.password, user.as_ref()).await? {
            return Err(IdentityError::Authentication);
        }
        let user = user.ok_or(IdentityError::Authentication)?;

        let access_token = self.issue_access_token(&user)?;
        let refresh_token = self.tokens.generate_refresh_token(&user).map_err(|e| {
            error!("Failed to generate refresh token: {}", e);
            IdentityError::Internal(e.to_string())
        })?;

        Ok(LoginResponse {
            user: UserResponse::from(&user),
            access_token,
            refresh_token,
        })
    }

    /// New access token built from the user's current state
    #[tracing::instrument(name = "IdentityService::refresh_token", skip(self))]
    pub async fn refresh_token(&self, user_id: Uuid) -> IdentityResult<RefreshTokenResponse> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)?;

        Ok(RefreshTokenResponse {
            access_token: self.issue_access_token(&user)?,
        })
    }

    #[tracing::instrument(name = "IdentityService::get_user_by_id", skip(self))]
    pub async fn get_user_by_id(&self, id: Uuid) -> IdentityResult<User> {
        self.store.find_by_id(id).await?.ok_or_else(user_not_found)
    }

    #[tracing::instrument(name = "IdentityService::update_user", skip(self, req))]
    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> IdentityResult<UpdateUserResponse> {
        validate(&req)?;

        let mut user = self.store.find_by_id(id).await?.ok_or_else(user_not_found)?;
        if !self.verify_password(&req.password, Some(&user)).await? {
            return Err(IdentityError::Authentication);
        }

        user.password_hash = self.hash_password(&req.new_password).await?;
        self.store.update(&user).await?;

        Ok(UpdateUserResponse {
            message: PASSWORD_UPDATED.to_string(),
        })
    }

    #[tracing::instrument(name = "IdentityService::verify_email", skip_all, fields(email = %req.email))]
    pub async fn verify_email(&self, req: VerifyEmailRequest) -> IdentityResult<VerifyResponse> {
        validate(&req)?;

        let mut user = self
            .store
            .find_by_email_and_code(&req.email, &req.verify_code_email)
            .await?
            .ok_or(IdentityError::Verification)?;

        user.approve_email = true;
        self.store.update(&user).await?;
        Ok(VerifyResponse::new(VERIFICATION_SUCCESSFUL))
    }

    #[tracing::instrument(name = "IdentityService::verify_phone_number", skip_all)]
    pub async fn verify_phone_number(
        &self,
        req: VerifyPhoneNumberRequest,
    ) -> IdentityResult<VerifyResponse> {
        validate(&req)?;

        let mut user = self
            .store
            .find_by_phone_and_code(&req.phone_number, &req.verify_code_phone_number)
            .await?
            .ok_or(IdentityError::Verification)?;

        user.approve_phone_number = true;
        self.store.update(&user).await?;
        Ok(VerifyResponse::new(VERIFICATION_SUCCESSFUL))
    }

    #[tracing::instrument(name = "IdentityService::resend_verify_code_email", skip_all, fields(email = %req.email))]
    pub async fn resend_verify_code_email(
        &self,
        req: ResendVerifyEmailRequest,
    ) -> IdentityResult<VerifyResponse> {
        validate(&req)?;

        let mut user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(IdentityError::Verification)?;

        user.verify_code_email = self.codes.generate(Channel::Email);
        let user = self.store.update(&user).await?;

        self.deliver(Channel::Email, &user.email, &user.verify_code_email)
            .await;
        Ok(VerifyResponse::new(RESEND_SUCCESSFUL))
    }

    #[tracing::instrument(name = "IdentityService::resend_verify_code_phone", skip_all)]
    pub async fn resend_verify_code_phone(
        &self,
        req: ResendVerifyPhoneNumberRequest,
    ) -> IdentityResult<VerifyResponse> {
        validate(&req)?;

        let mut user = self
            .store
            .find_by_phone(&req.phone_number)
            .await?
            .ok_or(IdentityError::Verification)?;

        let code = self.codes.generate(Channel::Phone);
        user.verify_code_phone_number = Some(code.clone());
        self.store.update(&user).await?;

        self.deliver(Channel::Phone, &req.phone_number, &code).await;
        Ok(VerifyResponse::new(RESEND_SUCCESSFUL))
    }

    #[tracing::instrument(name = "IdentityService::list_users", skip(self))]
    pub async fn list_users(&self, req: &ListUsersRequest) -> IdentityResult<ListUsersResponse> {
        let (filter, page) = req.normalize();
        let (users, pagination) = self.store.list_with_filter(&filter, &page).await?;

        Ok(ListUsersResponse {
            users: users.iter().map(UserSummary::from).collect(),
            pagination,
        })
    }

    /// Soft-delete a user after applying the optional overrides. Returns the
    /// snapshot that was deleted.
    #[tracing::instrument(name = "IdentityService::delete", skip(self, req))]
    pub async fn delete(&self, id: Uuid, req: DeleteUserRequest) -> IdentityResult<User> {
        validate(&req)?;

        let mut user = self.store.find_by_id(id).await?.ok_or_else(user_not_found)?;
        if let Some(name) = req.name {
            user.name = Some(name);
        }
        if let Some(phone_number) = req.phone_number {
            user.phone_number = Some(phone_number);
        }

        self.store.soft_delete(&user).await.map_err(|e| {
            error!("Failed to delete user {}: {}", id, e);
            IdentityError::from(e)
        })?;
        info!(user_id = %id, "User deleted");

        Ok(user)
    }
}
