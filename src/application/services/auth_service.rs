//! Authentication Service
//!
//! Verifies bearer tokens presented at connection time and resolves them to
//! an [`Identity`]. Tokens are HS256 JWTs whose subject is the user id.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::domain::{Identity, UserRepository};

/// Token verification trait for dependency injection
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolve a raw token to the identity it belongs to.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredential,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found")]
    UnknownUser,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Verifies JWTs against the shared secret and the user store.
pub struct JwtTokenVerifier<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl<U> JwtTokenVerifier<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, settings: &JwtSettings) -> Self {
        let secret = settings.secret.as_bytes();
        Self {
            user_repo,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry: Duration::minutes(settings.expiry_minutes),
        }
    }

    /// Issue a token for `user_id`. Used by tooling and tests; account
    /// login lives outside this service.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl<U> TokenVerifier for JwtTokenVerifier<U>
where
    U: UserRepository + 'static,
{
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let claims = self.decode_claims(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UnknownUser)?;

        if !user.is_active {
            return Err(AuthError::UnknownUser);
        }

        Ok(Identity::from(&user))
    }
}
