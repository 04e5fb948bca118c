//! Service settings loaded from `IDENTITY_*` environment variables

use serde::Deserialize;
use std::time::Duration;

use crate::cached::CacheTtls;

/// Which credential store adapter to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

/// Which cache adapter to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,
    /// Seconds a cached user listing lives
    #[serde(default = "default_users_cache_ttl")]
    pub users_cache_ttl: u64,
    /// Seconds a cached address listing lives
    #[serde(default = "default_addresses_cache_ttl")]
    pub addresses_cache_ttl: u64,
    #[serde(default)]
    pub store_backend: StoreBackend,
    #[serde(default)]
    pub cache_backend: CacheBackend,
}

fn default_http_addr() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_rpc_addr() -> String {
    "0.0.0.0:8889".to_string()
}

fn default_users_cache_ttl() -> u64 {
    300
}

fn default_addresses_cache_ttl() -> u64 {
    600
}

impl ServiceSettings {
    /// Load settings from the environment
    ///
    /// # Environment Variables
    /// - `IDENTITY_HTTP_ADDR`: HTTP listener address (default: 0.0.0.0:8888)
    /// - `IDENTITY_RPC_ADDR`: RPC listener address (default: 0.0.0.0:8889)
    /// - `IDENTITY_USERS_CACHE_TTL`: seconds (default: 300)
    /// - `IDENTITY_ADDRESSES_CACHE_TTL`: seconds (default: 600)
    /// - `IDENTITY_STORE_BACKEND`: `postgres` or `memory` (default: postgres)
    /// - `IDENTITY_CACHE_BACKEND`: `redis` or `memory` (default: redis)
    pub fn from_env() -> Result<Self, ::config::ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("IDENTITY").try_parsing(true))
            .build()?;

        settings.try_deserialize()
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            users: Duration::from_secs(self.users_cache_ttl),
            addresses: Duration::from_secs(self.addresses_cache_ttl),
        }
    }
}
