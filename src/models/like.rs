// src/models/like.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// What a like points at. Each kind has its own nullable column on 'likes'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Topic,
    Article,
    Comment,
}

impl LikeTarget {
    pub fn column(self) -> &'static str {
        match self {
            LikeTarget::Topic => "topic_id",
            LikeTarget::Article => "article_id",
            LikeTarget::Comment => "comment_id",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            LikeTarget::Topic => "topics",
            LikeTarget::Article => "articles",
            LikeTarget::Comment => "comments",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LikeTarget::Topic => "topic",
            LikeTarget::Article => "article",
            LikeTarget::Comment => "comment",
        }
    }
}

/// A like as listed on the likes page and author profiles.
///
/// For comments `target_slug` is the slug of the commented article, so
/// links always lead to a public page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LikeView {
    pub id: i64,
    pub like_dislike: bool,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub target_kind: String,
    pub target_title: String,
    pub target_slug: String,
}

pub const LIKE_VIEW_SELECT: &str = "SELECT l.id, l.like_dislike, l.slug, l.created_at, \
     CASE WHEN l.topic_id IS NOT NULL THEN 'topic' \
          WHEN l.article_id IS NOT NULL THEN 'article' \
          ELSE 'comment' END AS target_kind, \
     COALESCE(t.title, a.title, c.title) AS target_title, \
     COALESCE(t.slug, a.slug, ca.slug) AS target_slug \
     FROM likes l \
     LEFT JOIN topics t ON t.id = l.topic_id \
     LEFT JOIN articles a ON a.id = l.article_id \
     LEFT JOIN comments c ON c.id = l.comment_id \
     LEFT JOIN articles ca ON ca.id = c.article_id";

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    Unliked,
}

impl LikeOutcome {
    pub fn from_flag(like_dislike: bool) -> Self {
        if like_dislike {
            LikeOutcome::Liked
        } else {
            LikeOutcome::Unliked
        }
    }
}
