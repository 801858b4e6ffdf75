use axum::{
    Extension, Form,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tera::Context;
use validator::Validate;

use crate::{
    config::DASHBOARD_LIMIT,
    error::{AppError, is_unique_violation},
    models::{
        article::{ARTICLE_SELECT, Article},
        comment::{COMMENT_SELECT, Comment},
        user::UpdateProfileRequest,
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        form::{FormErrors, MultipartForm, non_blank},
        jwt::{self, CurrentUser},
        media::{self, PROFILE_IMAGES},
    },
};

/// The signed-in user's overview: what is new on the site, their own latest
/// articles and comments, and what others said about their articles.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
) -> Result<Response, AppError> {
    let latest_articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.is_active = 1 ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
    ))
    .bind(DASHBOARD_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let my_articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.added_by = ? AND a.is_active = 1 \
         ORDER BY a.created_at DESC, a.id DESC LIMIT ?"
    ))
    .bind(user.id)
    .bind(DASHBOARD_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let my_comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.added_by = ? AND c.is_active = 1 \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ?"
    ))
    .bind(user.id)
    .bind(DASHBOARD_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let comments_on_my_articles = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE a.added_by = ? AND c.added_by != ? \
         AND c.is_active = 1 AND a.is_active = 1 \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ?"
    ))
    .bind(user.id)
    .bind(user.id)
    .bind(DASHBOARD_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("latest_articles", &latest_articles);
    context.insert("my_articles", &my_articles);
    context.insert("my_comments", &my_comments);
    context.insert("comments_on_my_articles", &comments_on_my_articles);
    page.render("accounts/dashboard.html", context)
}

fn render_profile(
    page: PageContext,
    form: &UpdateProfileRequest,
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
    page.render_with_status(status, "accounts/profile.html", context)
}

pub async fn profile_form(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
) -> Result<Response, AppError> {
    render_profile(page, &UpdateProfileRequest::from_user(&user), &FormErrors::new())
}

/// Saves the editable profile fields. The username never changes.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Form(mut payload): Form<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_string();

    let mut errors = payload
        .validate()
        .err()
        .map(FormErrors::from)
        .unwrap_or_default();

    if !errors.contains("email") {
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(&payload.email)
                .bind(user.id)
                .fetch_one(&state.pool)
                .await?;
        if taken > 0 {
            errors.add("email", "A user with that email already exists.");
        }
    }

    if !errors.is_empty() {
        return render_profile(page, &payload, &errors);
    }

    let updated = sqlx::query(
        "UPDATE users SET name = ?, email = ?, phone = ?, about_me = ?, \
         web = ?, instagram = ?, twitter = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(non_blank(payload.phone.clone()))
    .bind(non_blank(payload.about_me.clone()))
    .bind(non_blank(payload.web.clone()))
    .bind(non_blank(payload.instagram.clone()))
    .bind(non_blank(payload.twitter.clone()))
    .bind(Utc::now())
    .bind(user.id)
    .execute(&state.pool)
    .await;

    match updated {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            errors.add("email", "A user with that email already exists.");
            return render_profile(page, &payload, &errors);
        }
        Err(e) => {
            tracing::error!("Failed to update profile of {}: {:?}", user.username, e);
            return Err(AppError::from(e));
        }
    }

    Ok(flash::redirect(
        "/accounts/profile",
        Level::Success,
        "Your profile has been updated.",
    ))
}

/// Replaces the profile photo with an uploaded image.
pub async fn update_photo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let Some(file) = form.take_file("photo") else {
        return Ok(flash::redirect(
            "/accounts/profile",
            Level::Warning,
            "Choose an image to upload.",
        ));
    };

    let stored = match media::save_image(&state.config.media_root, PROFILE_IMAGES, &file).await {
        Ok(path) => path,
        Err(AppError::BadRequest(message)) => {
            return Ok(flash::redirect("/accounts/profile", Level::Error, message));
        }
        Err(e) => return Err(e),
    };

    sqlx::query("UPDATE users SET photo = ?, updated_at = ? WHERE id = ?")
        .bind(&stored)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    media::remove_image(&state.config.media_root, &user.photo).await;

    Ok(flash::redirect(
        "/accounts/profile",
        Level::Success,
        "Your photo has been updated.",
    ))
}

/// Soft-deletes the current account and ends the session.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let now = Utc::now();
    sqlx::query("UPDATE users SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("User {} deleted their account", user.username);

    Ok((jwt::logout(jar), Redirect::to("/accounts/profile/deleted")).into_response())
}

pub async fn account_deleted(page: PageContext) -> Result<Response, AppError> {
    page.render("accounts/profile_deleted.html", Context::new())
}
