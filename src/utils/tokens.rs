//! Single-use links for account activation and password reset.
//!
//! Tokens are JWTs whose signing key mixes the server secret with the user's
//! password hash, activation flag and last login. Any of those changing makes
//! outstanding tokens for that user fail verification, which is what makes
//! them single-use without storing them.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::user::User, utils::jwt::now_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    purpose: String,
    exp: usize,
}

fn user_key(user: &User, purpose: TokenPurpose, secret: &str) -> String {
    let last_login = user
        .last_login
        .map(|t| t.timestamp_micros().to_string())
        .unwrap_or_default();
    format!(
        "{}:{}:{}:{}:{}",
        secret,
        purpose.as_str(),
        user.password,
        user.is_active,
        last_login
    )
}

pub fn make_token(
    user: &User,
    purpose: TokenPurpose,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = TokenClaims {
        sub: user.id.to_string(),
        purpose: purpose.as_str().to_string(),
        exp: now_timestamp()? + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(user_key(user, purpose, secret).as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub fn check_token(user: &User, purpose: TokenPurpose, token: &str, secret: &str) -> bool {
    let key = user_key(user, purpose, secret);
    match decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(key.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims.sub == user.id.to_string() && data.claims.purpose == purpose.as_str(),
        Err(e) => {
            tracing::debug!("Rejected {} token for user {}: {}", purpose.as_str(), user.id, e);
            false
        }
    }
}

/// URL-safe base64 of the decimal primary key, without padding.
pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}
