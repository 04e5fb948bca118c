//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::ApiError,
    jwt::{JwtService, TokenType},
    models::Role,
    state::AppState,
};

/// Authenticated caller, taken from a validated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Validate a bearer token of the expected type
pub fn authenticate(
    jwt_service: &JwtService,
    token: &str,
    expected: TokenType,
) -> Result<AuthUser, ApiError> {
    let claims = jwt_service.validate_token(token).map_err(|e| {
        warn!("Failed to validate token: {}", e);
        ApiError::Unauthorized
    })?;

    if claims.token_type != expected {
        warn!("Rejected {:?} token where {:?} was expected", claims.token_type, expected);
        return Err(ApiError::Unauthorized);
    }

    Ok(AuthUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

async fn require_token(
    state: AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
    expected: TokenType,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ApiError::Unauthorized)?;
    let user = authenticate(&state.jwt_service, bearer.token(), expected)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Require a valid access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    require_token(state, bearer, req, next, TokenType::Access).await
}

/// Require a valid refresh token
pub async fn refresh_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    require_token(state, bearer, req, next, TokenType::Refresh).await
}
