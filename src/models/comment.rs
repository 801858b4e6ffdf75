// src/models/comment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const COMMENT_SELECT: &str = "SELECT c.id, c.title, c.slug, c.body, c.article_id, c.added_by, \
     c.is_active, c.created_at, c.updated_at, c.deleted_at, \
     a.title AS article_title, a.slug AS article_slug, \
     u.username AS author_username, u.name AS author_name, u.photo AS author_photo, \
     (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id AND l.is_active = 1 AND l.like_dislike = 1) AS likes_count \
     FROM comments c \
     JOIN articles a ON a.id = c.article_id \
     JOIN users u ON u.id = c.added_by";

/// Represents the 'comments' table joined with its article and author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub title: String,

    /// Derived from title + article slug + creation time.
    pub slug: String,

    /// Plain text, at most 255 characters.
    pub body: String,

    pub article_id: i64,
    pub added_by: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub article_title: String,
    pub article_slug: String,
    pub author_username: String,
    pub author_name: String,
    pub author_photo: String,
    pub likes_count: i64,
}

/// DTO for adding or editing a comment.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)."))]
    pub title: String,

    #[validate(length(min = 1, max = 255, message = "Comment is required (max 255 characters)."))]
    pub body: String,
}

impl CommentRequest {
    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            title: comment.title.clone(),
            body: comment.body.clone(),
        }
    }
}
