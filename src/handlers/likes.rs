use axum::{
    Extension,
    extract::{Path, State},
    response::Response,
};
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tera::Context;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        like::{LIKE_VIEW_SELECT, LikeOutcome, LikeTarget, LikeView},
        user::User,
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        jwt::CurrentUser,
        slug::like_slug,
    },
};

/// The thing being liked, plus the slug of the public page showing it.
#[derive(Debug, FromRow)]
struct TargetRow {
    id: i64,
    title: String,
    slug: String,
    page_slug: String,
}

impl TargetRow {
    fn page_url(&self, target: LikeTarget) -> String {
        match target {
            LikeTarget::Topic => format!("/topics/{}", self.page_slug),
            LikeTarget::Article | LikeTarget::Comment => format!("/articles/{}", self.page_slug),
        }
    }
}

async fn find_target(
    pool: &SqlitePool,
    target: LikeTarget,
    slug: &str,
) -> Result<TargetRow, AppError> {
    let sql = match target {
        LikeTarget::Comment => "SELECT c.id, c.title, c.slug, a.slug AS page_slug \
             FROM comments c JOIN articles a ON a.id = c.article_id \
             WHERE c.slug = ? AND c.is_active = 1 AND a.is_active = 1"
            .to_string(),
        other => format!(
            "SELECT id, title, slug, slug AS page_slug FROM {} WHERE slug = ? AND is_active = 1",
            other.table()
        ),
    };

    sqlx::query_as::<_, TargetRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", target.label())))
}

/// Likes or un-likes `target` for `user` inside one transaction.
///
/// A user has at most one like row per target: the first toggle inserts it
/// as a like, later toggles flip it.
async fn toggle(
    pool: &SqlitePool,
    user: &User,
    target: LikeTarget,
    target_id: i64,
    target_slug: &str,
) -> Result<LikeOutcome, AppError> {
    let column = target.column();
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, (i64, bool)>(&format!(
        "SELECT id, like_dislike FROM likes WHERE added_by = ? AND {column} = ?"
    ))
    .bind(user.id)
    .bind(target_id)
    .fetch_optional(&mut *tx)
    .await?;

    let now = Utc::now();
    let outcome = match existing {
        None => {
            sqlx::query(&format!(
                "INSERT INTO likes (like_dislike, slug, {column}, added_by, is_active, created_at, updated_at) \
                 VALUES (1, ?, ?, ?, 1, ?, ?)"
            ))
            .bind(like_slug(&user.username, target_slug))
            .bind(target_id)
            .bind(user.id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return AppError::Conflict("Already liked".to_string());
                }
                AppError::from(e)
            })?;
            LikeOutcome::Liked
        }
        Some((like_id, like_dislike)) => {
            let flipped = !like_dislike;
            sqlx::query(
                "UPDATE likes SET like_dislike = ?, is_active = 1, deleted_at = NULL, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(flipped)
            .bind(now)
            .bind(like_id)
            .execute(&mut *tx)
            .await?;
            LikeOutcome::from_flag(flipped)
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

async fn toggle_and_redirect(
    state: &AppState,
    user: &User,
    target: LikeTarget,
    slug: &str,
) -> Result<Response, AppError> {
    let row = find_target(&state.pool, target, slug).await?;
    let outcome = toggle(&state.pool, user, target, row.id, &row.slug).await?;

    let message = match outcome {
        LikeOutcome::Liked => format!("You liked the {} {}", target.label(), row.title),
        LikeOutcome::Unliked => format!("You no longer like the {} {}", target.label(), row.title),
    };
    Ok(flash::redirect(&row.page_url(target), Level::Success, message))
}

pub async fn like_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    toggle_and_redirect(&state, &user, LikeTarget::Topic, &slug).await
}

pub async fn like_article(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    toggle_and_redirect(&state, &user, LikeTarget::Article, &slug).await
}

pub async fn like_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    toggle_and_redirect(&state, &user, LikeTarget::Comment, &slug).await
}

/// The current user's active likes, most recent first.
pub async fn list_likes(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
) -> Result<Response, AppError> {
    let likes = sqlx::query_as::<_, LikeView>(&format!(
        "{LIKE_VIEW_SELECT} WHERE l.added_by = ? AND l.is_active = 1 AND l.like_dislike = 1 ORDER BY l.updated_at DESC, l.id DESC"
    ))
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("likes", &likes);
    page.render("posts/likes.html", context)
}
