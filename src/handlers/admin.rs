// src/handlers/admin.rs

use axum::{
    extract::{Extension, Path, Query, State},
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tera::Context;

use crate::{
    config::PAGE_SIZE,
    error::AppError,
    models::{
        article::{ARTICLE_SELECT, Article},
        comment::{COMMENT_SELECT, Comment},
        newsletter::Newsletter,
        page::{Page, PageParams, Paginator},
        topic::{TOPIC_SELECT, Topic},
        user::{USER_COLUMNS, User},
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        jwt::CurrentUser,
    },
};

const ADMIN_HOME: &str = "/admin";
const MODERATION: &str = "/admin/moderation";

/// Headline numbers for the admin home page.
#[derive(Debug, Default, Serialize, FromRow)]
pub struct SiteCounts {
    pub users: i64,
    pub topics: i64,
    pub articles: i64,
    pub comments: i64,
    pub likes: i64,
    pub subscribers: i64,
}

/// Counts plus every account, including inactive and deleted ones.
/// Staff only.
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let counts = sqlx::query_as::<_, SiteCounts>(
        "SELECT \
         (SELECT COUNT(*) FROM users WHERE deleted_at IS NULL) AS users, \
         (SELECT COUNT(*) FROM topics WHERE is_active = 1) AS topics, \
         (SELECT COUNT(*) FROM articles WHERE is_active = 1) AS articles, \
         (SELECT COUNT(*) FROM comments WHERE is_active = 1) AS comments, \
         (SELECT COUNT(*) FROM likes WHERE is_active = 1 AND like_dislike = 1) AS likes, \
         (SELECT COUNT(*) FROM newsletters WHERE is_active = 1) AS subscribers",
    )
    .fetch_one(&state.pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let window = Paginator::new(PAGE_SIZE).window(total, params.page.as_deref());

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    let mut context = Context::new();
    context.insert("counts", &counts);
    context.insert("page", &Page::new(users, window));
    page.render("admin/index.html", context)
}

async fn find_user(pool: &SqlitePool, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
        .bind(username.to_lowercase())
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Soft-deletes an account. Staff cannot deactivate themselves.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let user = find_user(&state.pool, &username).await?;
    if user.id == admin.id {
        return Ok(flash::redirect(
            ADMIN_HOME,
            Level::Error,
            "You cannot deactivate your own account.",
        ));
    }

    let now = Utc::now();
    sqlx::query("UPDATE users SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Staff {} deactivated user {}", admin.username, user.username);
    Ok(flash::redirect(
        ADMIN_HOME,
        Level::Success,
        format!("{} deactivated", user.username),
    ))
}

pub async fn restore_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let user = find_user(&state.pool, &username).await?;

    sqlx::query("UPDATE users SET is_active = 1, deleted_at = NULL, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("Staff {} restored user {}", admin.username, user.username);
    Ok(flash::redirect(
        ADMIN_HOME,
        Level::Success,
        format!("{} restored", user.username),
    ))
}

/// Grants or revokes staff rights. Not on your own account.
pub async fn toggle_staff(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let user = find_user(&state.pool, &username).await?;
    if user.id == admin.id {
        return Ok(flash::redirect(
            ADMIN_HOME,
            Level::Error,
            "You cannot change your own staff status.",
        ));
    }

    let is_staff = !user.is_staff;
    sqlx::query("UPDATE users SET is_staff = ?, updated_at = ? WHERE id = ?")
        .bind(is_staff)
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(
        "Staff {} set is_staff={} for {}",
        admin.username,
        is_staff,
        user.username
    );
    let message = if is_staff {
        format!("{} is now staff", user.username)
    } else {
        format!("{} is no longer staff", user.username)
    };
    Ok(flash::redirect(ADMIN_HOME, Level::Success, message))
}

/// Soft-deleted content waiting for a decision.
pub async fn moderation(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    let topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.is_active = 0 ORDER BY t.updated_at DESC, t.id DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.is_active = 0 ORDER BY a.updated_at DESC, a.id DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.is_active = 0 ORDER BY c.updated_at DESC, c.id DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("topics", &topics);
    context.insert("articles", &articles);
    context.insert("comments", &comments);
    page.render("admin/moderation.html", context)
}

/// Clears the soft delete on one row of `table`, found by slug.
async fn restore_content(
    pool: &SqlitePool,
    table: &str,
    label: &str,
    slug: &str,
    admin: &User,
) -> Result<Response, AppError> {
    let title: Option<String> = sqlx::query_scalar(&format!(
        "SELECT title FROM {table} WHERE slug = ? AND is_active = 0"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    let title = title.ok_or(AppError::NotFound(format!("No deleted {} with this slug", label)))?;

    sqlx::query(&format!(
        "UPDATE {table} SET is_active = 1, deleted_at = NULL, updated_at = ? WHERE slug = ?"
    ))
    .bind(Utc::now())
    .bind(slug)
    .execute(pool)
    .await?;

    tracing::info!("Staff {} restored {} {}", admin.username, label, slug);
    Ok(flash::redirect(
        MODERATION,
        Level::Success,
        format!("{} restored", title),
    ))
}

pub async fn restore_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    restore_content(&state.pool, "topics", "topic", &slug, &admin).await
}

pub async fn restore_article(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    restore_content(&state.pool, "articles", "article", &slug, &admin).await
}

pub async fn restore_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    restore_content(&state.pool, "comments", "comment", &slug, &admin).await
}

pub async fn newsletters(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    let subscribers = sqlx::query_as::<_, Newsletter>(
        "SELECT id, email, is_active, created_at, updated_at, deleted_at FROM newsletters \
         ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("subscribers", &subscribers);
    page.render("admin/newsletters.html", context)
}
