// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::user::{USER_COLUMNS, User},
    state::AppState,
};

/// Name of the cookie holding the session JWT.
pub const SESSION_COOKIE: &str = "blogy_session";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub username: String,
    pub is_staff: bool,
    /// Fingerprint of the password hash at sign-in time.
    pub pwd: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The active account behind a valid session cookie.
/// Inserted into request extensions by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Seconds since the Unix epoch.
pub fn now_timestamp() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize)
}

/// Keyed digest of a password hash: the HS256 signature over it, truncated.
///
/// Changing the password changes the fingerprint, which ends every session
/// signed before the change.
pub fn password_fingerprint(password_hash: &str, secret: &str) -> Result<String, AppError> {
    let signed = encode(
        &Header::default(),
        &password_hash,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let signature = signed.rsplit('.').next().unwrap_or_default();
    Ok(signature.chars().take(22).collect())
}

/// Signs a new session JWT for the user.
pub fn sign_jwt(user: &User, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    let expiration = now_timestamp()? + expiration_seconds as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        is_staff: user.is_staff,
        pwd: password_fingerprint(&user.password, secret)?,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Builds the session cookie.
///
/// Without `max_age` the browser drops the cookie when it closes.
pub fn session_cookie(token: String, max_age: Option<u64>) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    if let Some(seconds) = max_age {
        builder = builder.max_age(time::Duration::seconds(seconds as i64));
    }

    builder.build()
}

/// Stages a fresh session for `user` in `jar`.
pub fn login(
    jar: CookieJar,
    user: &User,
    secret: &str,
    expiration_seconds: u64,
    remember_me: bool,
) -> Result<CookieJar, AppError> {
    let token = sign_jwt(user, secret, expiration_seconds)?;
    let max_age = remember_me.then_some(expiration_seconds);
    Ok(jar.add(session_cookie(token, max_age)))
}

pub fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// A session only counts while the password it was signed with is current.
fn session_matches(claims: &Claims, user: &User, secret: &str) -> bool {
    password_fingerprint(&user.password, secret).is_ok_and(|pwd| pwd == claims.pwd)
}

/// Axum Middleware: Session resolution.
///
/// Runs on every request. A valid session cookie that still belongs to an
/// active, non-deleted account whose password has not changed since the
/// cookie was issued injects `Claims` and `CurrentUser` into the
/// request extensions. Anything else leaves the request anonymous.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(claims) = verify_jwt(cookie.value(), &state.config.jwt_secret) {
            if let Ok(user_id) = claims.sub.parse::<i64>() {
                let lookup = sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     WHERE id = ? AND is_active = 1 AND deleted_at IS NULL"
                ))
                .bind(user_id)
                .fetch_optional(&state.pool)
                .await;

                match lookup {
                    Ok(Some(user))
                        if session_matches(&claims, &user, &state.config.jwt_secret) =>
                    {
                        req.extensions_mut().insert(claims);
                        req.extensions_mut().insert(CurrentUser(user));
                    }
                    Ok(Some(user)) => {
                        tracing::debug!(
                            "Stale session for user {} after a password change",
                            user.username
                        );
                    }
                    Ok(None) => {
                        tracing::debug!("Session for inactive or missing user {}", user_id);
                    }
                    Err(e) => {
                        tracing::error!("Failed to resolve session user: {:?}", e);
                    }
                }
            }
        }
    }

    next.run(req).await
}

/// Axum Middleware: Authentication.
///
/// Must be used AFTER `session_middleware`. Anonymous requests are sent to
/// the login page with a `next` parameter pointing back to where they were.
pub async fn login_required(req: Request, next: Next) -> Response {
    if req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    let target = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let path = target
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();

    Redirect::to(&format!("/accounts/login?next={}", encoded)).into_response()
}

/// Axum Middleware: Staff Authorization.
///
/// Must be used AFTER `login_required`. Non-staff users get 403 Forbidden.
pub async fn staff_required(req: Request, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::AuthError("Please log in".to_string()))?;

    if !user.0.is_staff {
        return Err(AppError::Forbidden(
            "This area is reserved for staff members.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice(password: &str) -> User {
        let now = chrono::Utc::now();
        User {
            id: 7,
            username: "alice".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            password: password.into(),
            phone: None,
            photo: "images/default.png".into(),
            about_me: None,
            web: None,
            instagram: None,
            twitter: None,
            is_active: true,
            is_staff: true,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn sign_then_verify() {
        let user = alice("hash-one");
        let token = sign_jwt(&user, "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.username, "alice");
        assert!(claims.is_staff);
        assert!(session_matches(&claims, &user, "secret"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(&alice("hash-one"), "secret", 60).unwrap();
        assert!(verify_jwt(&token, "other").is_err());
    }

    #[test]
    fn password_change_ends_the_session() {
        let token = sign_jwt(&alice("hash-one"), "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert!(!session_matches(&claims, &alice("hash-two"), "secret"));
    }

    #[test]
    fn fingerprint_is_stable_and_keyed() {
        let a = password_fingerprint("hash-one", "secret").unwrap();
        assert_eq!(a, password_fingerprint("hash-one", "secret").unwrap());
        assert_ne!(a, password_fingerprint("hash-one", "other").unwrap());
        assert_ne!(a, password_fingerprint("hash-two", "secret").unwrap());
        assert_eq!(a.len(), 22);
    }

    #[test]
    fn remember_me_controls_max_age() {
        let persistent = session_cookie("t".into(), Some(3600));
        assert_eq!(persistent.max_age(), Some(time::Duration::seconds(3600)));

        let browser_session = session_cookie("t".into(), None);
        assert_eq!(browser_session.max_age(), None);
        assert_eq!(browser_session.http_only(), Some(true));
    }
}
