//! Identity service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware, refresh_middleware},
    models::{
        DeleteUserRequest, ListUsersRequest, LoginRequest, RegisterRequest, RegisterResponse,
        ResendVerifyEmailRequest, ResendVerifyPhoneNumberRequest, Role, UpdateUserRequest,
        UserResponse, VerifyEmailRequest, VerifyPhoneNumberRequest,
    },
    state::AppState,
};

/// Create the router for the identity service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/update-user", put(update_user))
        .route("/auth/verify-code-email", put(verify_email))
        .route("/auth/verify-code-phone-number", put(verify_phone_number))
        .route("/auth/resend-verify-code-email", put(resend_verify_code_email))
        .route(
            "/auth/resend-verify-code-phone-number",
            put(resend_verify_code_phone),
        )
        .route("/auth/users", get(list_users))
        .route("/auth", delete(delete_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let refresh_routes = Router::new()
        .route("/auth/refresh-token", post(refresh_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            refresh_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth-doctor/register", post(register_doctor))
        .route("/auth-doctor/login", post(login_doctor))
        .route("/auth-client/register", post(register_client))
        .route("/auth-client/login", post(login_client))
        .merge(protected_routes)
        .merge(refresh_routes)
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "identity-service"
    }))
}

async fn register_as(
    state: AppState,
    mut req: RegisterRequest,
    role: Option<Role>,
) -> ApiResult<Json<RegisterResponse>> {
    if role.is_some() {
        req.role = role;
    }
    let user = state.identity.register(req).await?;
    Ok(Json(RegisterResponse {
        user: UserResponse::from(&user),
    }))
}

async fn login_as(
    state: AppState,
    mut req: LoginRequest,
    role: Option<Role>,
) -> ApiResult<impl IntoResponse> {
    if role.is_some() {
        req.role = role;
    }
    Ok(Json(state.identity.login(req).await?))
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    register_as(state, body(payload)?, None).await
}

pub async fn register_doctor(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    register_as(state, body(payload)?, Some(Role::Doctor)).await
}

pub async fn register_client(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    register_as(state, body(payload)?, Some(Role::Client)).await
}

/// Exchange credentials for an access and a refresh token
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    login_as(state, body(payload)?, None).await
}

pub async fn login_doctor(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    login_as(state, body(payload)?, Some(Role::Doctor)).await
}

pub async fn login_client(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    login_as(state, body(payload)?, Some(Role::Client)).await
}

/// Profile of the authenticated caller
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state.identity.get_user_by_id(caller.id).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// New access token for the holder of a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.identity.refresh_token(caller.id).await?))
}

/// Change the caller's password
pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = body(payload)?;
    Ok(Json(state.identity.update_user(caller.id, req).await?))
}

pub async fn verify_email(
    State(state): State<AppState>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.identity.verify_email(body(payload)?).await?))
}

pub async fn verify_phone_number(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPhoneNumberRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.identity.verify_phone_number(body(payload)?).await?,
    ))
}

pub async fn resend_verify_code_email(
    State(state): State<AppState>,
    payload: Result<Json<ResendVerifyEmailRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .identity
            .resend_verify_code_email(body(payload)?)
            .await?,
    ))
}

pub async fn resend_verify_code_phone(
    State(state): State<AppState>,
    payload: Result<Json<ResendVerifyPhoneNumberRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .identity
            .resend_verify_code_phone(body(payload)?)
            .await?,
    ))
}

/// Filtered, paginated user listing
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListUsersRequest>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(req) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.identity.list_users(&req).await?))
}

/// Soft-delete a user
pub async fn delete_user(
    State(state): State<AppState>,
    payload: Result<Json<DeleteUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let req = body(payload)?;
    let user = state.identity.delete(req.id, req).await?;
    Ok(Json(UserResponse::from(&user)))
}
