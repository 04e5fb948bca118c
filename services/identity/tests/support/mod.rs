//! Shared fixtures: an app wired to in-memory adapters and a code generator
//! that records what it delivers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::cache::InMemoryCache;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use identity::{
    AppState, CacheTtls, IdentityService,
    jwt::{JwtConfig, JwtKeys, JwtService},
    password::PasswordHasher,
    repositories::InMemoryCredentialStore,
    routes, rpc,
    verification::{Channel, CodeGenerator},
};

#[derive(Default)]
pub struct RecordingCodes {
    queued: Mutex<VecDeque<String>>,
    counter: Mutex<u32>,
    sent: Mutex<Vec<(Channel, String, String)>>,
}

impl RecordingCodes {
    /// Next generated code, ahead of the counter
    pub fn queue(&self, code: &str) {
        self.queued.lock().unwrap().push_back(code.to_string());
    }

    pub fn last_sent(&self, channel: Channel) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _, _)| *c == channel)
            .map(|(_, _, code)| code.clone())
    }
}

#[async_trait]
impl CodeGenerator for RecordingCodes {
    fn generate(&self, _channel: Channel) -> String {
        if let Some(code) = self.queued.lock().unwrap().pop_front() {
            return code;
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{:06}", 100000 + *counter)
    }

    async fn send(&self, channel: Channel, destination: &str, code: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel, destination.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub codes: Arc<RecordingCodes>,
    pub cache: InMemoryCache,
}

impl TestApp {
    pub fn new() -> Self {
        let jwt_service = JwtService::new(JwtConfig {
            keys: JwtKeys::Secret("integration-secret".to_string()),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        })
        .unwrap();
        let codes = Arc::new(RecordingCodes::default());
        let cache = InMemoryCache::new();

        let service = IdentityService::new(
            Arc::new(InMemoryCredentialStore::new()),
            PasswordHasher::with_params(1024, 1, 1).unwrap(),
            jwt_service.clone(),
            codes.clone(),
        );
        let state = AppState::new(
            Arc::new(service),
            Arc::new(cache.clone()),
            CacheTtls::default(),
            jwt_service,
        );

        Self {
            state,
            codes,
            cache,
        }
    }

    pub fn http(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    pub fn rpc(&self) -> Router {
        rpc::create_rpc_router(self.state.clone())
    }

    /// Send one request through the HTTP router
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.http().oneshot(request).await.unwrap();
        read(response).await
    }

    /// Send one call through the RPC router
    pub async fn rpc_call(&self, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.rpc().oneshot(request).await.unwrap();
        read(response).await
    }
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
