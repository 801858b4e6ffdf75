// src/handlers/auth.rs

use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tera::Context;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    mail::OutgoingEmail,
    models::user::{
        LoginRequest, PasswordResetRequest, RegisterRequest, SetPasswordRequest, USER_COLUMNS, User,
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        form::{FormErrors, NON_FIELD},
        hash::{hash_password, verify_password},
        jwt,
        tokens::{TokenPurpose, check_token, decode_uid, encode_uid, make_token},
    },
};

const DASHBOARD: &str = "/accounts/dashboard";

/// Only same-site paths are accepted as a post-login destination.
pub(crate) fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let is_local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    is_local.then(|| next.to_string())
}

async fn find_user_by_uid(pool: &SqlitePool, uidb64: &str) -> Result<Option<User>, AppError> {
    let Some(id) = decode_uid(uidb64) else {
        return Ok(None);
    };

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

fn render_register(
    page: PageContext,
    form: &RegisterRequest,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "accounts/register.html", context)
}

pub async fn register_form(page: PageContext) -> Result<Response, AppError> {
    if page.user.is_some() {
        return Ok(Redirect::to(DASHBOARD).into_response());
    }
    render_register(page, &RegisterRequest::default(), &FormErrors::new())
}

/// Registers a new, inactive account and emails its activation link.
///
/// The password is hashed with Argon2 before storing it.
pub async fn register(
    State(state): State<AppState>,
    page: PageContext,
    Form(mut payload): Form<RegisterRequest>,
) -> Result<Response, AppError> {
    if page.user.is_some() {
        return Ok(Redirect::to(DASHBOARD).into_response());
    }

    payload.username = payload.username.trim().to_lowercase();
    payload.email = payload.email.trim().to_string();
    payload.name = payload.name.trim().to_string();

    let mut errors = payload.form_errors();

    if !errors.contains("username") {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(&payload.username)
            .fetch_one(&state.pool)
            .await?;
        if taken > 0 {
            errors.add("username", "A user with that username already exists.");
        }
    }
    if !errors.contains("email") {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(&payload.email)
            .fetch_one(&state.pool)
            .await?;
        if taken > 0 {
            errors.add("email", "A user with that email already exists.");
        }
    }

    if !errors.is_empty() {
        return render_register(page, &payload, &errors);
    }

    let hashed_password = hash_password(&payload.password)?;
    let now = Utc::now();

    let inserted = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, name, password, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?, ?) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.name)
    .bind(&hashed_password)
    .bind(now)
    .bind(now)
    .fetch_one(&state.pool)
    .await;

    let user = match inserted {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            errors.add(NON_FIELD, "That username or email was just taken. Try another.");
            return render_register(page, &payload, &errors);
        }
        Err(e) => {
            tracing::error!("Failed to register user: {:?}", e);
            return Err(AppError::from(e));
        }
    };

    tracing::info!("Registered user {} (id {})", user.username, user.id);

    let token = make_token(
        &user,
        TokenPurpose::Activation,
        &state.config.jwt_secret,
        state.config.token_expiration,
    )?;
    let link = format!(
        "{}/accounts/activate/{}/{}",
        state.config.site_url,
        encode_uid(user.id),
        token
    );

    let mut email_context = Context::new();
    email_context.insert("name", &user.name);
    email_context.insert("username", &user.username);
    email_context.insert("link", &link);
    email_context.insert("site_url", &state.config.site_url);
    let email = OutgoingEmail::from_template(
        &user.email,
        "Activate your Blogy account",
        "emails/activation.txt",
        &email_context,
    )?;
    state.mailer.send(email).await?;

    let mut context = Context::new();
    context.insert("email", &user.email);
    page.render("accounts/register_email_confirm.html", context)
}

/// Follows an activation link: activates the account and signs the user in.
pub async fn activate(
    State(state): State<AppState>,
    page: PageContext,
    jar: CookieJar,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let user = find_user_by_uid(&state.pool, &uidb64).await?;

    let Some(user) = user.filter(|u| {
        check_token(u, TokenPurpose::Activation, &token, &state.config.jwt_secret)
    }) else {
        tracing::warn!("Invalid activation link used (uid {})", uidb64);
        return page.render("accounts/activation_invalid.html", Context::new());
    };

    let now = Utc::now();
    sqlx::query("UPDATE users SET is_active = 1, last_login = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Activated user {}", user.username);

    let jar = jwt::login(
        jar,
        &user,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
        false,
    )?;
    Ok(flash::redirect_with(
        jar,
        DASHBOARD,
        Level::Success,
        "Your account has been activated. Welcome to Blogy!",
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub next: Option<String>,
}

fn render_login(
    page: PageContext,
    form: &LoginRequest,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "accounts/login.html", context)
}

pub async fn login_form(
    page: PageContext,
    Query(params): Query<LoginParams>,
) -> Result<Response, AppError> {
    if page.user.is_some() {
        return Ok(Redirect::to(DASHBOARD).into_response());
    }
    let form = LoginRequest {
        next: safe_next(params.next.as_deref()),
        ..Default::default()
    };
    render_login(page, &form, &FormErrors::new())
}

/// Verifies the credentials and starts a session.
///
/// Accepts either the username or the email address. `remember_me` decides
/// whether the cookie outlives the browser.
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<Response, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return render_login(page, &payload, &FormErrors::from(validation_errors));
    }

    let identifier = payload.username.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE (username = ? OR email = ?) AND deleted_at IS NULL"
    ))
    .bind(&identifier)
    .bind(&identifier)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?;

    let mut errors = FormErrors::new();

    let user = match user {
        Some(user) if verify_password(&payload.password, &user.password)? => user,
        _ => {
            tracing::warn!("Failed login attempt for '{}'", identifier);
            errors.add(
                NON_FIELD,
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            return render_login(page, &payload, &errors);
        }
    };

    if !user.is_active {
        errors.add(
            NON_FIELD,
            "This account is inactive. Follow the activation link we emailed you.",
        );
        return render_login(page, &payload, &errors);
    }

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let jar = jwt::login(
        jar,
        &user,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
        payload.remember(),
    )?;

    let target = safe_next(payload.next.as_deref()).unwrap_or_else(|| DASHBOARD.to_string());
    tracing::info!("User {} logged in", user.username);
    Ok(flash::redirect_with(
        jar,
        &target,
        Level::Success,
        format!("Welcome back, {}!", user.name),
    ))
}

pub async fn logout(jar: CookieJar) -> Response {
    flash::redirect_with(
        jwt::logout(jar),
        "/accounts/login",
        Level::Info,
        "You have been logged out.",
    )
}

fn render_reset_form(
    page: PageContext,
    form: &PasswordResetRequest,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "accounts/password_reset_form.html", context)
}

pub async fn password_reset_form(page: PageContext) -> Result<Response, AppError> {
    render_reset_form(page, &PasswordResetRequest::default(), &FormErrors::new())
}

/// Emails a reset link to the active account registered with the address.
pub async fn password_reset(
    State(state): State<AppState>,
    page: PageContext,
    Form(mut payload): Form<PasswordResetRequest>,
) -> Result<Response, AppError> {
    payload.email = payload.email.trim().to_string();

    if let Err(validation_errors) = payload.validate() {
        return render_reset_form(page, &payload, &FormErrors::from(validation_errors));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE email = ? AND is_active = 1 AND deleted_at IS NULL"
    ))
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?;

    let Some(user) = user else {
        let mut errors = FormErrors::new();
        errors.add("email", "There is no active account with this email address.");
        return render_reset_form(page, &payload, &errors);
    };

    let token = make_token(
        &user,
        TokenPurpose::PasswordReset,
        &state.config.jwt_secret,
        state.config.token_expiration,
    )?;
    let link = format!(
        "{}/accounts/password-reset/confirm/{}/{}",
        state.config.site_url,
        encode_uid(user.id),
        token
    );

    let mut email_context = Context::new();
    email_context.insert("name", &user.name);
    email_context.insert("username", &user.username);
    email_context.insert("link", &link);
    email_context.insert("site_url", &state.config.site_url);
    let email = OutgoingEmail::from_template(
        &user.email,
        "Reset your Blogy password",
        "emails/password_reset.txt",
        &email_context,
    )?;
    state.mailer.send(email).await?;

    tracing::info!("Password reset requested for user {}", user.username);
    Ok(Redirect::to("/accounts/password-reset/sent").into_response())
}

pub async fn password_reset_sent(page: PageContext) -> Result<Response, AppError> {
    page.render("accounts/password_reset_sent.html", Context::new())
}

async fn reset_user(
    state: &AppState,
    uidb64: &str,
    token: &str,
) -> Result<Option<User>, AppError> {
    let user = find_user_by_uid(&state.pool, uidb64).await?;
    Ok(user.filter(|u| {
        u.is_active && check_token(u, TokenPurpose::PasswordReset, token, &state.config.jwt_secret)
    }))
}

fn render_set_password(
    page: PageContext,
    valid_link: bool,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("validlink", &valid_link);
    context.insert("errors", errors);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "accounts/password_reset_confirm.html", context)
}

pub async fn password_reset_confirm_form(
    State(state): State<AppState>,
    page: PageContext,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let valid = reset_user(&state, &uidb64, &token).await?.is_some();
    render_set_password(page, valid, &FormErrors::new())
}

/// Sets the new password. Changing the hash invalidates the link.
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    page: PageContext,
    Path((uidb64, token)): Path<(String, String)>,
    Form(payload): Form<SetPasswordRequest>,
) -> Result<Response, AppError> {
    let Some(user) = reset_user(&state, &uidb64, &token).await? else {
        tracing::warn!("Invalid password reset link used (uid {})", uidb64);
        return render_set_password(page, false, &FormErrors::new());
    };

    let errors = payload.form_errors();
    if !errors.is_empty() {
        return render_set_password(page, true, &errors);
    }

    let hashed_password = hash_password(&payload.new_password1)?;
    sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
        .bind(&hashed_password)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Password reset completed for user {}", user.username);
    Ok(Redirect::to("/accounts/password-reset/complete").into_response())
}

pub async fn password_reset_complete(page: PageContext) -> Result<Response, AppError> {
    page.render("accounts/password_reset_complete.html", Context::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(safe_next(Some("/posts/topics")), Some("/posts/topics".into()));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil")), None);
        assert_eq!(safe_next(None), None);
    }
}
