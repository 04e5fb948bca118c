//! Custom error types for the common library
//!
//! This module defines the infrastructure error types shared by every
//! service: database connectivity failures and cache backend failures.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for cache operations
///
/// Callers on the request path are expected to log and drop these: a cache
/// outage must never fail a request.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The Redis backend rejected the command or could not be reached
    #[error("Cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Configuration error
    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
