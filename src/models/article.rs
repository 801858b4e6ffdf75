// src/models/article.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use validator::Validate;

use crate::utils::form::MultipartForm;

/// Select list for [`Article`], including joined topic/author fields and
/// active comment/like counts. Append `WHERE ...` clauses after it.
pub const ARTICLE_SELECT: &str = "SELECT a.id, a.is_featured, a.title, a.slug, a.body, a.image, \
     a.topic_id, a.added_by, a.is_active, a.created_at, a.updated_at, a.deleted_at, \
     t.title AS topic_title, t.slug AS topic_slug, t.representative_color AS topic_color, \
     u.username AS author_username, u.name AS author_name, u.photo AS author_photo, \
     (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id AND c.is_active = 1) AS comments_count, \
     (SELECT COUNT(*) FROM likes l WHERE l.article_id = a.id AND l.is_active = 1 AND l.like_dislike = 1) AS likes_count \
     FROM articles a \
     JOIN topics t ON t.id = a.topic_id \
     JOIN users u ON u.id = a.added_by";

/// Represents the 'articles' table with the fields pages need from its topic
/// and author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Article {
    pub id: i64,

    /// At most one article has this set.
    pub is_featured: bool,

    pub title: String,

    /// Derived from title + topic title + creation time.
    pub slug: String,

    /// Sanitized HTML.
    pub body: String,

    /// Path below the media root.
    pub image: String,

    pub topic_id: i64,
    pub added_by: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub topic_title: String,
    pub topic_slug: String,
    pub topic_color: String,
    pub author_username: String,
    pub author_name: String,
    pub author_photo: String,

    pub comments_count: i64,
    pub likes_count: i64,
}

/// DTO for creating or updating an article. Arrives as multipart so an
/// image can come along; the image itself is handled separately.
#[derive(Debug, Default, Serialize, Validate)]
pub struct ArticleRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)."))]
    pub title: String,

    #[validate(length(min = 1, message = "Write something first."))]
    pub body: String,

    #[validate(required(message = "Choose a topic."))]
    pub topic: Option<i64>,
}

impl ArticleRequest {
    pub fn from_form(form: &MultipartForm) -> Self {
        Self {
            title: form.text("title").trim().to_string(),
            body: form.text("body"),
            topic: form.text("topic").trim().parse().ok(),
        }
    }

    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            body: article.body.clone(),
            topic: Some(article.topic_id),
        }
    }
}
