//! JWT service for token generation and validation
//!
//! This module signs the short-lived access tokens and longer-lived refresh
//! tokens handed out at login. Tokens are signed with HS256 when a shared
//! secret is configured and with RS256 when a PEM key pair is configured.
//! Validation is exposed for the request middleware only; the identity
//! operations never read claims back out of a token.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::{Role, User};

/// Signing key material
#[derive(Debug, Clone)]
pub enum JwtKeys {
    /// Shared secret (HS256)
    Secret(String),
    /// PEM encoded key pair (RS256)
    Rsa {
        private_key: String,
        public_key: String,
    },
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Key material used to sign and verify tokens
    pub keys: JwtKeys,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Shared secret; when set, tokens are signed with HS256
    /// - `JWT_PRIVATE_KEY`: Private key (PEM or path to a PEM file), used when `JWT_SECRET` is unset
    /// - `JWT_PUBLIC_KEY`: Public key (PEM or path to a PEM file), used when `JWT_SECRET` is unset
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let keys = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => JwtKeys::Secret(secret),
            _ => JwtKeys::Rsa {
                private_key: read_pem_env("JWT_PRIVATE_KEY")?,
                public_key: read_pem_env("JWT_PUBLIC_KEY")?,
            },
        };

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string()) // 15 minutes
            .parse()
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        Ok(JwtConfig {
            keys,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Read a PEM value from the environment; anything that does not look like
/// PEM is treated as a file path (CWD first, then the crate root).
fn read_pem_env(var: &str) -> Result<String> {
    let value =
        std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let pem = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read {} file: {}", var, e))?;

    Ok(pem.trim().to_string())
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// User email at issue time
    pub email: String,
    /// User role at issue time
    pub role: Role,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match &config.keys {
            JwtKeys::Secret(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            JwtKeys::Rsa {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(JwtService {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    fn generate(&self, user: &User, token_type: TokenType, expiry: u64) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + expiry,
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serial_test::serial;

    fn service(secret: &str) -> JwtService {
        JwtService::new(JwtConfig {
            keys: JwtKeys::Secret(secret.to_string()),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        })
        .unwrap()
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            name: None,
            phone_number: None,
            role: Role::Doctor,
            verify_code_email: "123456".to_string(),
            approve_email: false,
            verify_code_phone_number: None,
            approve_phone_number: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_access_and_refresh_tokens_carry_claims() {
        let jwt = service("test-secret");
        let user = user();

        let access = jwt.validate_token(&jwt.generate_access_token(&user).unwrap()).unwrap();
        assert_eq!(access.sub, user.id);
        assert_eq!(access.email, user.email);
        assert_eq!(access.role, Role::Doctor);
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.exp - access.iat, 900);

        let refresh = jwt.validate_token(&jwt.generate_refresh_token(&user).unwrap()).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.exp - refresh.iat, 604800);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = service("first").generate_access_token(&user()).unwrap();
        assert!(service("second").validate_token(&token).is_err());
        assert!(service("first").validate_token("garbage").is_err());
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env_prefers_secret() {
        unsafe {
            std::env::set_var("JWT_SECRET", "env-secret");
            std::env::set_var("JWT_ACCESS_TOKEN_EXPIRY", "60");
            std::env::remove_var("JWT_REFRESH_TOKEN_EXPIRY");
        }

        let config = JwtConfig::from_env().unwrap();
        assert!(matches!(config.keys, JwtKeys::Secret(ref s) if s == "env-secret"));
        assert_eq!(config.access_token_expiry, 60);
        assert_eq!(config.refresh_token_expiry, 604800);

        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_ACCESS_TOKEN_EXPIRY");
        }
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env_requires_keys_without_secret() {
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_PRIVATE_KEY");
        }

        assert!(JwtConfig::from_env().is_err());
    }
}
