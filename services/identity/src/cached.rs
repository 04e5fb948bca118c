//! Read-through caching and invalidate-after-write around [`IdentityService`].
//!
//! Reads of the user listing are served from the cache when possible. Every
//! successful mutation drops the whole `users` family. Cache failures are
//! logged and never reach the caller: an unreachable cache behaves like one
//! that always misses.
//!
//! A per-family generation counter closes the window where a read loads a
//! value, a write invalidates, and the read then stores its stale value. The
//! read notes the generation before loading and deletes its own entry if the
//! generation moved while it was loading.

use common::cache::{Cache, CacheKey, ResourceTag};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::IdentityResult,
    models::{
        DeleteUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, LoginResponse,
        RefreshTokenResponse, RegisterRequest, ResendVerifyEmailRequest,
        ResendVerifyPhoneNumberRequest, UpdateUserRequest, UpdateUserResponse, User,
        VerifyEmailRequest, VerifyPhoneNumberRequest, VerifyResponse,
    },
    service::IdentityService,
};

/// Path the user listing is keyed under, whichever listener served it
pub const USERS_LIST_PATH: &str = "/auth/users";

/// Time-to-live per resource family
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub users: Duration,
    pub addresses: Duration,
}

impl CacheTtls {
    pub fn for_tag(&self, tag: ResourceTag) -> Duration {
        match tag {
            ResourceTag::Users => self.users,
            ResourceTag::Addresses => self.addresses,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            users: Duration::from_secs(300),
            addresses: Duration::from_secs(600),
        }
    }
}

#[derive(Default)]
struct Generations {
    users: AtomicU64,
    addresses: AtomicU64,
}

impl Generations {
    fn for_tag(&self, tag: ResourceTag) -> &AtomicU64 {
        match tag {
            ResourceTag::Users => &self.users,
            ResourceTag::Addresses => &self.addresses,
        }
    }
}

#[derive(Clone)]
pub struct CachedIdentity {
    service: Arc<IdentityService>,
    cache: Arc<dyn Cache>,
    ttls: CacheTtls,
    generations: Arc<Generations>,
}

impl CachedIdentity {
    pub fn new(service: Arc<IdentityService>, cache: Arc<dyn Cache>, ttls: CacheTtls) -> Self {
        Self {
            service,
            cache,
            ttls,
            generations: Arc::new(Generations::default()),
        }
    }

    /// Cached value for `key`, or the result of `load` stored under `key`
    async fn read_through<T, F>(&self, key: CacheKey, load: F) -> IdentityResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = IdentityResult<T>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    debug!(%key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(%key, "Discarding undecodable cache entry: {}", e),
            },
            Ok(None) => debug!(%key, "Cache miss"),
            Err(e) => warn!(%key, "Cache read failed: {}", e),
        }

        let generation = self.generations.for_tag(key.tag());
        let seen = generation.load(Ordering::Acquire);

        let value = load.await?;

        let payload = match serde_json::to_string(&value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%key, "Failed to encode cache entry: {}", e);
                return Ok(value);
            }
        };
        let ttl = self.ttls.for_tag(key.tag());
        if let Err(e) = self.cache.set_with_ttl(&key, &payload, ttl).await {
            warn!(%key, "Cache write failed: {}", e);
            return Ok(value);
        }

        // A write landed while loading; what was stored may predate it.
        if generation.load(Ordering::Acquire) != seen {
            debug!(%key, "Dropping entry populated across an invalidation");
            if let Err(e) = self.cache.delete(&key).await {
                warn!(%key, "Cache delete failed: {}", e);
            }
        }

        Ok(value)
    }

    /// Drop every cached entry of a resource family
    pub async fn invalidate(&self, tag: ResourceTag) {
        self.generations.for_tag(tag).fetch_add(1, Ordering::AcqRel);
        match self.cache.delete_by_pattern(tag).await {
            Ok(removed) => debug!(%tag, removed, "Invalidated cache family"),
            Err(e) => warn!(%tag, "Cache invalidation failed: {}", e),
        }
    }

    async fn invalidate_after<T>(&self, result: IdentityResult<T>) -> IdentityResult<T> {
        if result.is_ok() {
            self.invalidate(ResourceTag::Users).await;
        }
        result
    }

    pub async fn list_users(&self, req: &ListUsersRequest) -> IdentityResult<ListUsersResponse> {
        let key = CacheKey::from_request(
            ResourceTag::Users,
            USERS_LIST_PATH,
            Some(&req.canonical_query()),
        );
        self.read_through(key, self.service.list_users(req)).await
    }

    pub async fn register(&self, req: RegisterRequest) -> IdentityResult<User> {
        let result = self.service.register(req).await;
        self.invalidate_after(result).await
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> IdentityResult<UpdateUserResponse> {
        let result = self.service.update_user(id, req).await;
        self.invalidate_after(result).await
    }

    pub async fn verify_email(&self, req: VerifyEmailRequest) -> IdentityResult<VerifyResponse> {
        let result = self.service.verify_email(req).await;
        self.invalidate_after(result).await
    }

    pub async fn verify_phone_number(
        &self,
        req: VerifyPhoneNumberRequest,
    ) -> IdentityResult<VerifyResponse> {
        let result = self.service.verify_phone_number(req).await;
        self.invalidate_after(result).await
    }

    pub async fn resend_verify_code_email(
        &self,
        req: ResendVerifyEmailRequest,
    ) -> IdentityResult<VerifyResponse> {
        let result = self.service.resend_verify_code_email(req).await;
        self.invalidate_after(result).await
    }

    pub async fn resend_verify_code_phone(
        &self,
        req: ResendVerifyPhoneNumberRequest,
    ) -> IdentityResult<VerifyResponse> {
        let result = self.service.resend_verify_code_phone(req).await;
        self.invalidate_after(result).await
    }

    pub async fn delete(&self, id: Uuid, req: DeleteUserRequest) -> IdentityResult<User> {
        let result = self.service.delete(id, req).await;
        self.invalidate_after(result).await
    }

    // Responses below carry tokens or one caller's profile; never cached.

    pub async fn login(&self, req: LoginRequest) -> IdentityResult<LoginResponse> {
        self.service.login(req).await
    }

    pub async fn refresh_token(&self, user_id: Uuid) -> IdentityResult<RefreshTokenResponse> {
        self.service.refresh_token(user_id).await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> IdentityResult<User> {
        self.service.get_user_by_id(id).await
    }
}
