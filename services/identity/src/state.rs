//! Application state shared across handlers

use common::cache::Cache;
use std::sync::Arc;

use crate::{
    cached::{CacheTtls, CachedIdentity},
    jwt::JwtService,
    service::IdentityService,
};

/// Application state shared across handlers and both listeners
#[derive(Clone)]
pub struct AppState {
    pub identity: CachedIdentity,
    pub jwt_service: JwtService,
}

impl AppState {
    pub fn new(
        service: Arc<IdentityService>,
        cache: Arc<dyn Cache>,
        ttls: CacheTtls,
        jwt_service: JwtService,
    ) -> Self {
        Self {
            identity: CachedIdentity::new(service, cache, ttls),
            jwt_service,
        }
    }
}
