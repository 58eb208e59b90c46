//! Account registration, password login, and bearer-token verification.
//!
//! Passwords are hashed with bcrypt on the blocking pool. Tokens are HS256 JWTs whose subject is
//! the username, which doubles as the tenant key of everything the account uploads.

use crate::model::TenantKey;
use crate::storage::{StorageError, UserRecord, UserStore};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised by authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password.
    #[error("incorrect username or password")]
    InvalidCredentials,
    /// Bearer token was malformed, expired, or signed with another key.
    #[error("invalid bearer token: {0}")]
    InvalidToken(jsonwebtoken::errors::Error),
    /// Username was blank.
    #[error("username must not be empty")]
    InvalidUsername,
    /// Token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    /// Blocking hash task was cancelled or panicked.
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// User store failed, including duplicate usernames.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Whether the error means the caller failed to authenticate (as opposed to a server fault).
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::InvalidToken(_))
    }
}

/// Access token returned by login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Signed JWT.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and validates bearer tokens against a [`UserStore`].
pub struct AuthService {
    users: Arc<dyn UserStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_lifetime_minutes: i64,
    hash_cost: u32,
}

impl AuthService {
    /// Service signing tokens with `secret` that expire after `token_lifetime_minutes`.
    pub fn new(users: Arc<dyn UserStore>, secret: &str, token_lifetime_minutes: i64) -> Self {
        Self {
            users,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_lifetime_minutes,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost factor.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Create an account and return a token for it.
    pub async fn register(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let tenant = TenantKey::new(username).map_err(|_| AuthError::InvalidUsername)?;
        let password = password.to_string();
        let cost = self.hash_cost;
        let hashed_password =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        self.users
            .insert(UserRecord {
                username: tenant.as_str().to_string(),
                hashed_password,
            })
            .await?;
        tracing::info!(username = %tenant, "Registered user");
        self.issue(&tenant)
    }

    /// Check a password and return a fresh token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token, AuthError> {
        let tenant = TenantKey::new(username).map_err(|_| AuthError::InvalidCredentials)?;
        let Some(user) = self.users.get(tenant.as_str()).await? else {
            tracing::debug!(username = %tenant, "Login for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &user.hashed_password))
                .await??;
        if !matches {
            tracing::debug!(username = %tenant, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        self.issue(&tenant)
    }

    /// Validate a bearer token and return the tenant it was issued to.
    pub fn verify(&self, token: &str) -> Result<TenantKey, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(AuthError::InvalidToken)?;
        TenantKey::new(data.claims.sub).map_err(|_| AuthError::InvalidCredentials)
    }

    /// Sign a token for `tenant`.
    pub fn issue(&self, tenant: &TenantKey) -> Result<Token, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: tenant.as_str().to_string(),
            iat: now,
            exp: now + self.token_lifetime_minutes * 60,
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)?;
        Ok(Token {
            access_token,
            token_type: "bearer".to_string(),
        })
    }
}
