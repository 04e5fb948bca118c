//! JSON RPC listener
//!
//! A single `POST /rpc` endpoint taking `{method, params, token?}`. Every
//! method maps onto the same cached identity operations as the HTTP routes;
//! failures come back as `{error: {code, message}}` with the status code the
//! HTTP listener would have used.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult, IdentityError},
    jwt::TokenType,
    middleware::{AuthUser, authenticate},
    models::{
        DeleteUserRequest, ListUsersRequest, RegisterRequest, RegisterResponse, Role, UserResponse,
    },
    state::AppState,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Bearer token for methods that act on the caller
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl From<ApiResult<Value>> for RpcResponse {
    fn from(result: ApiResult<Value>) -> Self {
        match result {
            Ok(value) => Self {
                result: Some(value),
                error: None,
            },
            Err(err) => {
                let (status, message) = err.into_parts();
                Self {
                    result: None,
                    error: Some(RpcError {
                        code: status.as_u16(),
                        message,
                    }),
                }
            }
        }
    }
}

/// Create the router for the RPC listener
pub fn create_rpc_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .with_state(state)
}

pub async fn handle_rpc(
    State(state): State<AppState>,
    payload: Result<Json<RpcRequest>, JsonRejection>,
) -> Json<RpcResponse> {
    let result = match payload {
        Ok(Json(req)) => dispatch(&state, req).await,
        Err(e) => Err(ApiError::BadRequest(e.body_text())),
    };
    Json(RpcResponse::from(result))
}

fn params<T: DeserializeOwned>(params: Value) -> ApiResult<T> {
    serde_json::from_value(params)
        .map_err(|e| ApiError::BadRequest(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| IdentityError::Internal(e.to_string()).into())
}

/// Run one RPC call against the shared identity service
pub async fn dispatch(state: &AppState, req: RpcRequest) -> ApiResult<Value> {
    let RpcRequest {
        method,
        params: raw,
        token,
    } = req;
    let caller = |expected: TokenType| -> ApiResult<AuthUser> {
        let token = token.as_deref().ok_or(ApiError::Unauthorized)?;
        authenticate(&state.jwt_service, token, expected)
    };
    let identity = &state.identity;

    match method.as_str() {
        "register" | "register_doctor" | "register_client" => {
            let mut req: RegisterRequest = params(raw)?;
            req.role = match method.as_str() {
                "register_doctor" => Some(Role::Doctor),
                "register_client" => Some(Role::Client),
                _ => None,
            };
            let user = identity.register(req).await?;
            to_value(RegisterResponse {
                user: UserResponse::from(&user),
            })
        }
        "login" => to_value(identity.login(params(raw)?).await?),
        "refresh_token" => {
            let caller = caller(TokenType::Refresh)?;
            to_value(identity.refresh_token(caller.id).await?)
        }
        "me" => {
            let caller = caller(TokenType::Access)?;
            let user = identity.get_user_by_id(caller.id).await?;
            to_value(UserResponse::from(&user))
        }
        "update_user" => {
            let caller = caller(TokenType::Access)?;
            to_value(identity.update_user(caller.id, params(raw)?).await?)
        }
        "verify_email" => {
            caller(TokenType::Access)?;
            to_value(identity.verify_email(params(raw)?).await?)
        }
        "verify_phone_number" => {
            caller(TokenType::Access)?;
            to_value(identity.verify_phone_number(params(raw)?).await?)
        }
        "resend_verify_code_email" => {
            caller(TokenType::Access)?;
            to_value(identity.resend_verify_code_email(params(raw)?).await?)
        }
        "resend_verify_code_phone_number" => {
            caller(TokenType::Access)?;
            to_value(identity.resend_verify_code_phone(params(raw)?).await?)
        }
        "list_users" => {
            caller(TokenType::Access)?;
            let req: ListUsersRequest = if raw.is_null() {
                ListUsersRequest::default()
            } else {
                params(raw)?
            };
            to_value(identity.list_users(&req).await?)
        }
        "delete" => {
            caller(TokenType::Access)?;
            let request: DeleteUserRequest = params(raw)?;
            let user = identity.delete(request.id, request).await?;
            to_value(UserResponse::from(&user))
        }
        other => Err(ApiError::BadRequest(format!("Unknown method: {}", other))),
    }
}
