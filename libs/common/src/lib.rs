//! Common library for the identity workspace
//!
//! This crate provides the infrastructure shared by the services: PostgreSQL
//! connectivity, the response cache port and its adapters, and the error
//! types both of them report.

pub mod cache;
pub mod database;
pub mod error;

/// Example usage of the cache module
///
/// ```rust,no_run
/// use common::cache::{Cache, CacheKey, RedisConfig, RedisPool, ResourceTag};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = RedisPool::new(&RedisConfig::from_env()?).await?;
///     let key = CacheKey::from_request(ResourceTag::Users, "/auth/users", Some("page=1"));
///     pool.set_with_ttl(&key, "[]", Duration::from_secs(60)).await?;
///     pool.delete_by_pattern(ResourceTag::Users).await?;
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
