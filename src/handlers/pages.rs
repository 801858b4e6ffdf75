//! Public pages: home, article and topic pages, authors, search, hot picks.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tera::Context;

use crate::{
    config::{PAGE_SIZE, RANDOM_TOPICS_LIMIT, TRENDING_WINDOW},
    error::AppError,
    handlers::{articles, topics},
    models::{
        article::{ARTICLE_SELECT, Article},
        comment::{COMMENT_SELECT, Comment, CommentRequest},
        like::{LIKE_VIEW_SELECT, LikeView},
        page::{Page, PageParams, PageWindow, Paginator},
        topic::{TOPIC_SELECT, Topic},
        user::{AuthorCard, USER_COLUMNS, User},
    },
    state::AppState,
    templates::PageContext,
    utils::form::FormErrors,
};

/// One page of active articles, newest first.
async fn active_articles_page(
    state: &AppState,
    requested: Option<&str>,
) -> Result<Page<Article>, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE is_active = 1")
        .fetch_one(&state.pool)
        .await?;
    let window = Paginator::new(PAGE_SIZE).window(count, requested);

    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.is_active = 1 \
         ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Page::new(articles, window))
}

/// Home page: random topics, the featured article, the latest articles and
/// the topics trending among recent articles.
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let random_topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.is_active = 1 ORDER BY RANDOM() LIMIT ?"
    ))
    .bind(RANDOM_TOPICS_LIMIT)
    .fetch_all(&state.pool)
    .await?;

    let featured = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.is_featured = 1 AND a.is_active = 1 LIMIT 1"
    ))
    .fetch_optional(&state.pool)
    .await?;

    let trending_topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.is_active = 1 AND t.id IN ( \
             SELECT topic_id FROM ( \
                 SELECT topic_id FROM articles WHERE is_active = 1 \
                 ORDER BY created_at DESC, id DESC LIMIT ? \
             ) \
         ) ORDER BY t.title"
    ))
    .bind(TRENDING_WINDOW)
    .fetch_all(&state.pool)
    .await?;

    let articles = active_articles_page(&state, params.page.as_deref()).await?;

    let mut context = Context::new();
    context.insert("random_topics", &random_topics);
    context.insert("featured", &featured);
    context.insert("trending_topics", &trending_topics);
    context.insert("page", &articles);
    page.render("pages/index.html", context)
}

pub async fn articles(
    State(state): State<AppState>,
    page: PageContext,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let articles = active_articles_page(&state, params.page.as_deref()).await?;

    let mut context = Context::new();
    context.insert("page", &articles);
    page.render("pages/articles.html", context)
}

/// Renders the public article page. Used directly and to show comment
/// form errors.
pub(crate) async fn render_article(
    state: &AppState,
    page: PageContext,
    article: Article,
    form: &CommentRequest,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.article_id = ? AND c.is_active = 1 \
         ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(article.id)
    .fetch_all(&state.pool)
    .await?;

    let user_likes = match &page.user {
        Some(user) => {
            let liked: Option<bool> = sqlx::query_scalar(
                "SELECT like_dislike FROM likes WHERE added_by = ? AND article_id = ? AND is_active = 1",
            )
            .bind(user.id)
            .bind(article.id)
            .fetch_optional(&state.pool)
            .await?;
            liked.unwrap_or(false)
        }
        None => false,
    };

    let mut context = Context::new();
    context.insert("comments_count", &comments.len());
    context.insert("likes_count", &article.likes_count);
    context.insert("comments", &comments);
    context.insert("user_likes", &user_likes);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("article", &article);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    page.render_with_status(status, "pages/article.html", context)
}

pub async fn article(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let article = articles::find_active(&state.pool, &slug).await?;
    render_article(
        &state,
        page,
        article,
        &CommentRequest::default(),
        &FormErrors::new(),
    )
    .await
}

pub async fn topics_index(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    let topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.is_active = 1 ORDER BY t.created_at DESC, t.id DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("topics", &topics);
    page.render("pages/topics.html", context)
}

pub async fn topic(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let topic = topics::find_active(&state.pool, &slug).await?;

    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.topic_id = ? AND a.is_active = 1 ORDER BY a.created_at DESC, a.id DESC"
    ))
    .bind(topic.id)
    .fetch_all(&state.pool)
    .await?;

    let likes_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM likes WHERE topic_id = ? AND is_active = 1 AND like_dislike = 1",
    )
    .bind(topic.id)
    .fetch_one(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("articles_count", &articles.len());
    context.insert("likes_count", &likes_count);
    context.insert("articles", &articles);
    context.insert("topic", &topic);
    page.render("pages/topic.html", context)
}

/// Active, non-deleted users, newest first.
pub async fn authors(
    State(state): State<AppState>,
    page: PageContext,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE is_active = 1 AND deleted_at IS NULL",
    )
    .fetch_one(&state.pool)
    .await?;
    let window = Paginator::new(PAGE_SIZE).window(count, params.page.as_deref());

    let authors = sqlx::query_as::<_, AuthorCard>(
        "SELECT u.username, u.name, u.photo, u.about_me, u.created_at, \
         (SELECT COUNT(*) FROM articles a WHERE a.added_by = u.id AND a.is_active = 1) AS articles_count \
         FROM users u WHERE u.is_active = 1 AND u.deleted_at IS NULL \
         ORDER BY u.created_at DESC, u.id DESC LIMIT ? OFFSET ?",
    )
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("page", &Page::new(authors, window));
    page.render("pages/authors.html", context)
}

/// Author profile with everything they have published.
pub async fn author(
    State(state): State<AppState>,
    page: PageContext,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE username = ? AND is_active = 1 AND deleted_at IS NULL"
    ))
    .bind(username.to_lowercase())
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("Author not found".to_string()))?;

    let topics = sqlx::query_as::<_, Topic>(&format!(
        "{TOPIC_SELECT} WHERE t.added_by = ? AND t.is_active = 1 ORDER BY t.created_at DESC, t.id DESC"
    ))
    .bind(author.id)
    .fetch_all(&state.pool)
    .await?;

    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.added_by = ? AND a.is_active = 1 ORDER BY a.created_at DESC, a.id DESC"
    ))
    .bind(author.id)
    .fetch_all(&state.pool)
    .await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.added_by = ? AND c.is_active = 1 AND a.is_active = 1 \
         ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(author.id)
    .fetch_all(&state.pool)
    .await?;

    let likes = sqlx::query_as::<_, LikeView>(&format!(
        "{LIKE_VIEW_SELECT} WHERE l.added_by = ? AND l.is_active = 1 AND l.like_dislike = 1 \
         ORDER BY l.updated_at DESC, l.id DESC"
    ))
    .bind(author.id)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("topics_count", &topics.len());
    context.insert("articles_count", &articles.len());
    context.insert("comments_count", &comments.len());
    context.insert("likes_count", &likes.len());
    context.insert("author", &author);
    context.insert("topics", &topics);
    context.insert("articles", &articles);
    context.insert("comments", &comments);
    context.insert("likes", &likes);
    page.render("pages/author.html", context)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
}

/// The searchable text of one active article.
#[derive(Debug, FromRow)]
struct SearchCandidate {
    id: i64,
    title: String,
    body: String,
    topic_title: String,
    topic_description: String,
    author_name: String,
}

impl SearchCandidate {
    /// `needle` must already be lower-cased. Folding happens here rather than
    /// in SQLite, whose `lower()` only knows ASCII.
    fn matches(&self, needle: &str) -> bool {
        [
            &self.title,
            &self.body,
            &self.topic_title,
            &self.topic_description,
            &self.author_name,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Ids of active articles matching `query`, newest first.
async fn search_ids(state: &AppState, query: &str) -> Result<Vec<i64>, AppError> {
    let candidates = sqlx::query_as::<_, SearchCandidate>(
        "SELECT a.id, a.title, a.body, t.title AS topic_title, \
         t.description AS topic_description, u.name AS author_name \
         FROM articles a \
         JOIN topics t ON t.id = a.topic_id \
         JOIN users u ON u.id = a.added_by \
         WHERE a.is_active = 1 \
         ORDER BY a.created_at DESC, a.id DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let needle = query.to_lowercase();
    Ok(candidates
        .into_iter()
        .filter(|candidate| candidate.matches(&needle))
        .map(|candidate| candidate.id)
        .collect())
}

/// Case-insensitive substring search over article title and body, topic
/// title and description, and author name. A blank query finds nothing.
pub async fn search(
    State(state): State<AppState>,
    page: PageContext,
    Query(params): Query<SearchParams>,
) -> Result<Response, AppError> {
    let query = params.q.as_deref().unwrap_or_default().trim().to_string();
    let paginator = Paginator::new(PAGE_SIZE);

    let results = if query.is_empty() {
        Page::new(Vec::new(), paginator.window(0, None))
    } else {
        let ids = search_ids(&state, &query).await?;
        let window: PageWindow = paginator.window(ids.len() as i64, params.page.as_deref());

        let page_ids: Vec<i64> = ids
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .collect();

        let articles = if page_ids.is_empty() {
            Vec::new()
        } else {
            let mut builder =
                QueryBuilder::<Sqlite>::new(format!("{ARTICLE_SELECT} WHERE a.id IN ("));
            let mut separated = builder.separated(", ");
            for id in &page_ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY a.created_at DESC, a.id DESC");
            builder
                .build_query_as::<Article>()
                .fetch_all(&state.pool)
                .await?
        };

        Page::new(articles, window)
    };

    tracing::debug!("Search '{}' matched {} articles", query, results.count);

    let mut context = Context::new();
    context.insert("query", &query);
    context.insert("page", &results);
    page.render("pages/search.html", context)
}

/// Articles drawing the most recent comments.
pub async fn hot_picks(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    let articles = sqlx::query_as::<_, Article>(&format!(
        "{ARTICLE_SELECT} WHERE a.is_active = 1 AND a.id IN ( \
             SELECT article_id FROM ( \
                 SELECT article_id FROM comments WHERE is_active = 1 \
                 ORDER BY created_at DESC, id DESC LIMIT ? \
             ) \
         ) ORDER BY a.created_at DESC, a.id DESC"
    ))
    .bind(TRENDING_WINDOW)
    .fetch_all(&state.pool)
    .await?;

    let mut context = Context::new();
    context.insert("articles", &articles);
    page.render("pages/hot_picks.html", context)
}

pub async fn not_found() -> AppError {
    AppError::NotFound("The page you are looking for does not exist.".to_string())
}
