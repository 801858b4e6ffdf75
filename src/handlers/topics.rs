use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tera::Context;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        article::{ARTICLE_SELECT, Article},
        topic::{TOPIC_COLORS, TOPIC_SELECT, Topic, TopicRequest},
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        form::FormErrors,
        jwt::CurrentUser,
        slug::topic_slug,
    },
};

/// Active topic by slug, or 404.
pub(crate) async fn find_active(pool: &SqlitePool, slug: &str) -> Result<Topic, AppError> {
    sqlx::query_as::<_, Topic>(&format!("{TOPIC_SELECT} WHERE t.slug = ? AND t.is_active = 1"))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))
}

fn not_allowed(topic: &Topic, action: &str) -> Response {
    flash::redirect(
        &format!("/topics/{}", topic.slug),
        Level::Error,
        format!("You are not allowed to {} this topic.", action),
    )
}

fn render_form(
    page: PageContext,
    form: &TopicRequest,
    errors: &FormErrors,
    topic: Option<&Topic>,
) -> Result<Response, AppError> {
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("colors", &TOPIC_COLORS);
    context.insert("topic", &topic);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "posts/topic_form.html", context)
}

/// Title must be free and must produce a usable slug.
async fn check_title(
    pool: &SqlitePool,
    form: &TopicRequest,
    errors: &mut FormErrors,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    if errors.contains("title") {
        return Ok(());
    }
    if topic_slug(&form.title).is_empty() {
        errors.add("title", "Title must contain letters or digits.");
        return Ok(());
    }

    let taken: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE title = ? AND id != ?")
            .bind(&form.title)
            .bind(exclude_id.unwrap_or(0))
            .fetch_one(pool)
            .await?;
    if taken > 0 {
        errors.add("title", "A topic with this title already exists.");
    }
    Ok(())
}

/// The current user's active topics, most recently updated first.
pub async fn list_topics(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
) -> Result<Response, AppError> {
    let topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.added_by = ? AND t.is_active = 1 ORDER BY t.updated_at DESC, t.id DESC"
    ))
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("topics", &topics);
    page.render("posts/topics.html", context)
}

pub async fn add_topic_form(page: PageContext) -> Result<Response, AppError> {
    render_form(page, &TopicRequest::default(), &FormErrors::new(), None)
}

pub async fn add_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Form(mut payload): Form<TopicRequest>,
) -> Result<Response, AppError> {
    payload.title = payload.title.trim().to_string();
    payload.description = payload.description.trim().to_string();

    let mut errors = payload
        .validate()
        .err()
        .map(FormErrors::from)
        .unwrap_or_default();
    check_title(&state.pool, &payload, &mut errors, None).await?;

    if !errors.is_empty() {
        return render_form(page, &payload, &errors, None);
    }

    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT INTO topics (title, slug, description, representative_color, added_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.title)
    .bind(topic_slug(&payload.title))
    .bind(&payload.description)
    .bind(&payload.representative_color)
    .bind(user.id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await;

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            errors.add("title", "A topic with a similar title already exists.");
            return render_form(page, &payload, &errors, None);
        }
        Err(e) => {
            tracing::error!("Failed to create topic: {:?}", e);
            return Err(AppError::from(e));
        }
    }

    tracing::info!("User {} added topic '{}'", user.username, payload.title);
    Ok(flash::redirect(
        "/posts/topics",
        Level::Success,
        format!("{} added", payload.title),
    ))
}

/// Management view of a topic and its articles. Owner or staff only.
pub async fn view_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let topic = find_active(&state.pool, &slug).await?;
    if !user.can_manage(topic.added_by) {
        return Ok(not_allowed(&topic, "manage"));
    }

    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.topic_id = ? AND a.is_active = 1 ORDER BY a.created_at DESC, a.id DESC"
    ))
    .bind(topic.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("topic", &topic);
    context.insert("articles", &articles);
    page.render("posts/topic.html", context)
}

pub async fn update_topic_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let topic = find_active(&state.pool, &slug).await?;
    if !user.can_manage(topic.added_by) {
        return Ok(not_allowed(&topic, "update"));
    }
    render_form(
        page,
        &TopicRequest::from_topic(&topic),
        &FormErrors::new(),
        Some(&topic),
    )
}

/// Updates title, description and color. The slug stays as created.
pub async fn update_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
    Form(mut payload): Form<TopicRequest>,
) -> Result<Response, AppError> {
    let topic = find_active(&state.pool, &slug).await?;
    if !user.can_manage(topic.added_by) {
        tracing::warn!("User {} tried to update topic {}", user.username, topic.slug);
        return Ok(not_allowed(&topic, "update"));
    }

    payload.title = payload.title.trim().to_string();
    payload.description = payload.description.trim().to_string();

    let mut errors = payload
        .validate()
        .err()
        .map(FormErrors::from)
        .unwrap_or_default();
    check_title(&state.pool, &payload, &mut errors, Some(topic.id)).await?;

    if !errors.is_empty() {
        return render_form(page, &payload, &errors, Some(&topic));
    }

    let updated = sqlx::query(
        "UPDATE topics SET title = ?, description = ?, representative_color = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.representative_color)
    .bind(Utc::now())
    .bind(topic.id)
    .execute(&state.pool)
    .await;

    match updated {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            errors.add("title", "A topic with this title already exists.");
            return render_form(page, &payload, &errors, Some(&topic));
        }
        Err(e) => {
            tracing::error!("Failed to update topic {}: {:?}", topic.slug, e);
            return Err(AppError::from(e));
        }
    }

    Ok(flash::redirect(
        &format!("/posts/topics/{}", topic.slug),
        Level::Success,
        format!("{} updated", payload.title),
    ))
}

/// Soft delete.
pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let topic = find_active(&state.pool, &slug).await?;
    if !user.can_manage(topic.added_by) {
        tracing::warn!("User {} tried to delete topic {}", user.username, topic.slug);
        return Ok(not_allowed(&topic, "delete"));
    }

    let now = Utc::now();
    sqlx::query("UPDATE topics SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(topic.id)
        .execute(&state.pool)
        .await?;

    tracing::info!("User {} deleted topic {}", user.username, topic.slug);
    Ok(flash::redirect(
        "/posts/topics",
        Level::Success,
        format!("{} deleted", topic.title),
    ))
}
