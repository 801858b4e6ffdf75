use axum::{Form, extract::State, response::Response};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::newsletter::SubscribeRequest,
    state::AppState,
    utils::flash::{self, Level},
};

/// Creates a subscription, or reactivates a previously cancelled one.
pub async fn subscribe(
    State(state): State<AppState>,
    Form(payload): Form<SubscribeRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim().to_lowercase();
    let payload = SubscribeRequest { email };

    if payload.validate().is_err() {
        return Ok(flash::redirect(
            "/",
            Level::Error,
            "Enter a valid email address to subscribe.",
        ));
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO newsletters (email, is_active, created_at, updated_at) VALUES (?, 1, ?, ?) \
         ON CONFLICT(email) DO UPDATE SET is_active = 1, deleted_at = NULL, updated_at = excluded.updated_at",
    )
    .bind(&payload.email)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to subscribe {}: {:?}", payload.email, e);
        AppError::from(e)
    })?;

    tracing::info!("Newsletter subscription for {}", payload.email);
    Ok(flash::redirect(
        "/",
        Level::Success,
        "Thank you for subscribing to our newsletter.",
    ))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Form(payload): Form<SubscribeRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim().to_lowercase();
    let now = Utc::now();

    let updated = sqlx::query(
        "UPDATE newsletters SET is_active = 0, deleted_at = ?, updated_at = ? \
         WHERE email = ? AND is_active = 1",
    )
    .bind(now)
    .bind(now)
    .bind(&email)
    .execute(&state.pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(flash::redirect(
            "/",
            Level::Info,
            "This email is not subscribed to our newsletter.",
        ));
    }

    Ok(flash::redirect(
        "/",
        Level::Success,
        "You have been unsubscribed from our newsletter.",
    ))
}
