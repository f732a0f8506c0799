use argon2::password_hash::{Error as PasswordHashError, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tracing;

use crate::error::AuthFailure;
use crate::types::UserId;

#[derive(Clone)]
pub struct TokenKeys {
    enc: EncodingKey,
    dec: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            enc: EncodingKey::from_secret(secret.as_bytes()),
            dec: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Only the user id travels in the token; role flags are re-read from the
/// user record on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
}

pub fn generate_token(keys: &TokenKeys, user_id: UserId, ttl: Duration) -> anyhow::Result<String> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        user_id,
        iat,
        exp: iat + ttl.num_seconds(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.enc).map_err(|e| {
        tracing::error!("Failed to generate JWT token: {}", e);
        anyhow::anyhow!("token signing failed: {}", e)
    })
}

pub fn verify_token(keys: &TokenKeys, token: &str) -> Result<Claims, AuthFailure> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(token, &keys.dec, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
            _ => {
                tracing::debug!("JWT verification failed: {}", e);
                AuthFailure::InvalidToken
            }
        })
}

pub fn hash_password(raw: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut thread_rng());
    let hash = Argon2::default().hash_password(raw.as_bytes(), &salt)?.to_string();
    Ok(hash)
}

pub fn verify_password(raw: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
