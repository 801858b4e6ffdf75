use axum::{
    Extension, Form,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tera::Context;
use validator::Validate;

use crate::{
    config::DEFAULT_IMAGE,
    error::{AppError, is_unique_violation},
    handlers::pages,
    models::{
        article::{ARTICLE_SELECT, Article, ArticleRequest},
        comment::{COMMENT_SELECT, Comment, CommentRequest},
        topic::{TOPIC_SELECT, Topic},
    },
    state::AppState,
    templates::PageContext,
    utils::{
        flash::{self, Level},
        form::{FormErrors, MultipartForm},
        html::clean_html,
        jwt::CurrentUser,
        media::{self, ARTICLE_IMAGES, UploadedFile},
        slug::{article_slug, comment_slug},
    },
};

/// Active article by slug, or 404.
pub(crate) async fn find_active(pool: &SqlitePool, slug: &str) -> Result<Article, AppError> {
    sqlx::query_as::<_, Article>(&format!("{ARTICLE_SELECT} WHERE a.slug = ? AND a.is_active = 1"))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Article not found".to_string()))
}

fn not_allowed(article: &Article, action: &str) -> Response {
    flash::redirect(
        &format!("/articles/{}", article.slug),
        Level::Error,
        format!("You are not allowed to {} this article.", action),
    )
}

async fn active_topics(pool: &SqlitePool) -> Result<Vec<Topic>, AppError> {
    Ok(sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.is_active = 1 ORDER BY t.title"
    ))
    .fetch_all(pool)
    .await?)
}

async fn render_form(
    pool: &SqlitePool,
    page: PageContext,
    form: &ArticleRequest,
    errors: &FormErrors,
    article: Option<&Article>,
) -> Result<Response, AppError> {
    let topics = active_topics(pool).await?;
    let mut context = Context::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("topics", &topics);
    context.insert("article", &article);
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "posts/article_form.html", context)
}

/// Validated article input, ready to be written.
struct CleanArticle {
    title: String,
    body: String,
    topic: Topic,
    image: Option<UploadedFile>,
}

/// Field checks, body sanitizing, topic lookup, title uniqueness and image type.
async fn clean_submission(
    pool: &SqlitePool,
    mut form: MultipartForm,
    exclude_id: Option<i64>,
) -> Result<(ArticleRequest, Result<CleanArticle, FormErrors>), AppError> {
    let mut request = ArticleRequest::from_form(&form);
    let image = form.take_file("image");

    let mut errors = request
        .validate()
        .err()
        .map(FormErrors::from)
        .unwrap_or_default();

    let body = clean_html(&request.body);
    if !errors.contains("body") && body.trim().is_empty() {
        errors.add("body", "Write something first.");
    }
    request.body = body;

    let topic = match request.topic {
        Some(topic_id) => {
            let topic = sqlx::query_as::<_, Topic>(&format!(
                "{TOPIC_SELECT} WHERE t.id = ? AND t.is_active = 1"
            ))
            .bind(topic_id)
            .fetch_optional(pool)
            .await?;
            if topic.is_none() {
                errors.add("topic", "Choose a topic.");
            }
            topic
        }
        None => None,
    };

    if !errors.contains("title") {
        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE title = ? AND id != ?")
                .bind(&request.title)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(pool)
                .await?;
        if taken > 0 {
            errors.add("title", "An article with this title already exists.");
        }
    }

    if let Some(file) = &image {
        if file.image_extension().is_none() {
            errors.add("image", "Upload a valid image (png, jpg, jpeg, gif or webp).");
        }
    }

    let outcome = match topic {
        Some(topic) if errors.is_empty() => Ok(CleanArticle {
            title: request.title.clone(),
            body: request.body.clone(),
            topic,
            image,
        }),
        _ => Err(errors),
    };
    Ok((request, outcome))
}

/// The current user's active articles.
pub async fn list_articles(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
) -> Result<Response, AppError> {
    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.added_by = ? AND a.is_active = 1 \
         ORDER BY a.updated_at DESC, a.id DESC"
    ))
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("articles", &articles);
    page.render("posts/articles.html", context)
}

pub async fn add_article_form(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    render_form(&state.pool, page, &ArticleRequest::default(), &FormErrors::new(), None).await
}

pub async fn add_article(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = MultipartForm::read(multipart).await?;
    let (request, outcome) = clean_submission(&state.pool, form, None).await?;

    let article = match outcome {
        Ok(article) => article,
        Err(errors) => return render_form(&state.pool, page, &request, &errors, None).await,
    };

    let image = match &article.image {
        Some(file) => Some(media::save_image(&state.config.media_root, ARTICLE_IMAGES, file).await?),
        None => None,
    };

    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT INTO articles (title, slug, body, image, topic_id, added_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&article.title)
    .bind(article_slug(&article.title, &article.topic.title))
    .bind(&article.body)
    .bind(image.as_deref().unwrap_or(DEFAULT_IMAGE))
    .bind(article.topic.id)
    .bind(user.id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await;

    if let Err(e) = inserted {
        if let Some(path) = &image {
            media::remove_image(&state.config.media_root, path).await;
        }
        if is_unique_violation(&e) {
            let mut errors = FormErrors::new();
            errors.add("title", "An article with this title already exists.");
            return render_form(&state.pool, page, &request, &errors, None).await;
        }
        tracing::error!("Failed to create article: {:?}", e);
        return Err(AppError::from(e));
    }

    tracing::info!("User {} added article '{}'", user.username, article.title);
    Ok(flash::redirect(
        "/posts/articles",
        Level::Success,
        format!("{} added", article.title),
    ))
}

/// Management view with the article's comments. Owner or staff only.
pub async fn view_article(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = find_active(&state.pool, &slug).await?;
    if !user.can_manage(article.added_by) {
        return Ok(not_allowed(&article, "manage"));
    }

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.article_id = ? AND c.is_active = 1 ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(article.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("article", &article);
    context.insert("comments", &comments);
    page.render("posts/article.html", context)
}

pub async fn update_article_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = find_active(&state.pool, &slug).await?;
    if !user.can_manage(article.added_by) {
        return Ok(not_allowed(&article, "update"));
    }
    render_form(
        &state.pool,
        page,
        &ArticleRequest::from_article(&article),
        &FormErrors::new(),
        Some(&article),
    )
    .await
}

/// Updates title, body and topic; a new image replaces the old one.
pub async fn update_article(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let existing = find_active(&state.pool, &slug).await?;
    if !user.can_manage(existing.added_by) {
        tracing::warn!("User {} tried to update article {}", user.username, existing.slug);
        return Ok(not_allowed(&existing, "update"));
    }

    let form = MultipartForm::read(multipart).await?;
    let (request, outcome) = clean_submission(&state.pool, form, Some(existing.id)).await?;

    let article = match outcome {
        Ok(article) => article,
        Err(errors) => {
            return render_form(&state.pool, page, &request, &errors, Some(&existing)).await;
        }
    };

    let new_image = match &article.image {
        Some(file) => Some(media::save_image(&state.config.media_root, ARTICLE_IMAGES, file).await?),
        None => None,
    };

    sqlx::query(
        "UPDATE articles SET title = ?, body = ?, topic_id = ?, image = COALESCE(?, image), updated_at = ? \
         WHERE id = ?",
    )
    .bind(&article.title)
    .bind(&article.body)
    .bind(article.topic.id)
    .bind(&new_image)
    .bind(Utc::now())
    .bind(existing.id)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update article {}: {:?}", existing.slug, e);
        AppError::from(e)
    })?;

    if new_image.is_some() {
        media::remove_image(&state.config.media_root, &existing.image).await;
    }

    Ok(flash::redirect(
        &format!("/posts/articles/{}", existing.slug),
        Level::Success,
        format!("{} updated", article.title),
    ))
}

/// Makes this the one featured article. Staff only.
///
/// Clearing the old flag and setting the new one happen in one transaction,
/// so readers never see zero or two featured articles.
pub async fn set_featured(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = find_active(&state.pool, &slug).await?;
    if !user.is_staff {
        tracing::warn!("Non-staff user {} tried to feature {}", user.username, article.slug);
        return Ok(not_allowed(&article, "feature"));
    }

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE articles SET is_featured = 0 WHERE is_featured = 1")
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE articles SET is_featured = 1, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(article.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("User {} featured article {}", user.username, article.slug);
    Ok(flash::redirect(
        &format!("/posts/articles/{}", article.slug),
        Level::Success,
        format!("{} is now the featured article", article.title),
    ))
}

/// Soft delete. A deleted article also loses the featured flag.
pub async fn delete_article(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = find_active(&state.pool, &slug).await?;
    if !user.can_manage(article.added_by) {
        tracing::warn!("User {} tried to delete article {}", user.username, article.slug);
        return Ok(not_allowed(&article, "delete"));
    }

    let now = Utc::now();
    sqlx::query(
        "UPDATE articles SET is_active = 0, is_featured = 0, deleted_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(article.id)
    .execute(&state.pool)
    .await?;

    tracing::info!("User {} deleted article {}", user.username, article.slug);
    Ok(flash::redirect(
        "/posts/articles",
        Level::Success,
        format!("{} deleted", article.title),
    ))
}

/// Adds a comment to an active article. Invalid input re-renders the
/// article page with the errors.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    page: PageContext,
    Path(slug): Path<String>,
    Form(mut payload): Form<CommentRequest>,
) -> Result<Response, AppError> {
    let article = find_active(&state.pool, &slug).await?;

    payload.title = payload.title.trim().to_string();
    payload.body = payload.body.trim().to_string();

    if let Err(validation_errors) = payload.validate() {
        return pages::render_article(
            &state,
            page,
            article,
            &payload,
            &FormErrors::from(validation_errors),
        )
        .await;
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO comments (title, slug, body, article_id, added_by, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&payload.title)
    .bind(comment_slug(&payload.title, &article.slug))
    .bind(&payload.body)
    .bind(article.id)
    .bind(user.id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to add comment: {:?}", e);
        AppError::from(e)
    })?;

    Ok(flash::redirect(
        &format!("/articles/{}", article.slug),
        Level::Success,
        format!("{} added", payload.title),
    ))
}
