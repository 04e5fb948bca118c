//! Identity service: accounts, credentials, tokens and verification codes,
//! fronted by a read-through response cache.

pub mod cached;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod rpc;
pub mod service;
pub mod settings;
pub mod state;
pub mod validation;
pub mod verification;

pub use cached::{CacheTtls, CachedIdentity};
pub use error::{ApiError, IdentityError, IdentityResult};
pub use service::IdentityService;
pub use state::AppState;
