use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tera::Context;
use validator::Validate;

use crate::{
    config::PAGE_SIZE,
    error::AppError,
    models::{
        comment::{COMMENT_SELECT, Comment, CommentRequest},
        page::{Page, PageParams, Paginator},
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        form::FormErrors,
        jwt::CurrentUser,
    },
};

async fn find_active(pool: &SqlitePool, slug: &str) -> Result<Comment, AppError> {
    sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.slug = ? AND c.is_active = 1"))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))
}

fn not_allowed(comment: &Comment, action: &str) -> Response {
    flash::redirect(
        &format!("/articles/{}", comment.article_slug),
        Level::Error,
        format!("You are not allowed to {} this comment.", action),
    )
}

fn render_form(
    page: PageContext,
    form: &CommentRequest,
    errors: &FormErrors,
    comment: &Comment,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("comment", comment);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "posts/comment_form.html", context)
}

/// The current user's active comments, newest first, paginated.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE added_by = ? AND is_active = 1")
            .bind(user.id)
            .fetch_one(&state.pool)
            .await?;
    let window = Paginator::new(PAGE_SIZE).window(count, params.page.as_deref());

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.added_by = ? AND c.is_active = 1 \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(user.id)
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("page", &Page::new(comments, window));
    page.render("posts/comments.html", context)
}

pub async fn view_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let comment = find_active(&state.pool, &slug).await?;
    if !user.can_manage(comment.added_by) {
        return Ok(not_allowed(&comment, "manage"));
    }

    let mut context = Context::new();
    context.insert("comment", &comment);
    page.render("posts/comment.html", context)
}

pub async fn update_comment_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let comment = find_active(&state.pool, &slug).await?;
    if !user.can_manage(comment.added_by) {
        return Ok(not_allowed(&comment, "update"));
    }
    render_form(
        page,
        &CommentRequest::from_comment(&comment),
        &FormErrors::new(),
        &comment,
    )
}

pub async fn update_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
    Form(mut payload): Form<CommentRequest>,
) -> Result<Response, AppError> {
    let comment = find_active(&state.pool, &slug).await?;
    if !user.can_manage(comment.added_by) {
        tracing::warn!("User {} tried to update comment {}", user.username, comment.slug);
        return Ok(not_allowed(&comment, "update"));
    }

    payload.title = payload.title.trim().to_string();
    payload.body = payload.body.trim().to_string();

    if let Err(validation_errors) = payload.validate() {
        return render_form(page, &payload, &FormErrors::from(validation_errors), &comment);
    }

    sqlx::query("UPDATE comments SET title = ?, body = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.title)
        .bind(&payload.body)
        .bind(Utc::now())
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    Ok(flash::redirect(
        &format!("/posts/comments/{}", comment.slug),
        Level::Success,
        format!("{} updated", payload.title),
    ))
}

/// Soft delete.
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let comment = find_active(&state.pool, &slug).await?;
    if !user.can_manage(comment.added_by) {
        tracing::warn!("User {} tried to delete comment {}", user.username, comment.slug);
        return Ok(not_allowed(&comment, "delete"));
    }

    let now = Utc::now();
    sqlx::query("UPDATE comments SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(comment.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("User {} deleted comment {}", user.username, comment.slug);
    Ok(flash::redirect(
        &format!("/articles/{}", comment.article_slug),
        Level::Success,
        format!("{} deleted", comment.title),
    ))
}
