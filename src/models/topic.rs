// src/models/topic.rs

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Bootstrap palette names a topic badge may use.
pub const TOPIC_COLORS: [&str; 8] = [
    "primary",
    "secondary",
    "success",
    "danger",
    "warning",
    "info",
    "light",
    "dark",
];

/// Select list for [`Topic`]. Append `WHERE ...` clauses after it.
pub const TOPIC_SELECT: &str = "SELECT t.id, t.title, t.slug, t.description, t.representative_color, \
     t.added_by, t.is_active, t.created_at, t.updated_at, t.deleted_at, \
     u.username AS author_username, \
     (SELECT COUNT(*) FROM articles a WHERE a.topic_id = t.id AND a.is_active = 1) AS articles_count \
     FROM topics t \
     JOIN users u ON u.id = t.added_by";

/// Represents the 'topics' table, joined with its owner's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Topic {
    pub id: i64,

    /// Unique, at most 30 characters.
    pub title: String,

    /// Derived from the title at creation and never changed.
    pub slug: String,

    pub description: String,

    /// One of [`TOPIC_COLORS`].
    pub representative_color: String,

    pub added_by: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub author_username: String,

    /// Active articles filed under this topic.
    pub articles_count: i64,
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    if TOPIC_COLORS.contains(&color) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_color")
            .with_message(Cow::Borrowed("Pick one of the listed colors.")))
    }
}

/// DTO for creating or updating a topic.
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct TopicRequest {
    #[validate(length(min = 1, max = 30, message = "Title is required (max 30 characters)."))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Description is required (max 255 characters)."
    ))]
    pub description: String,

    #[serde(default = "default_color")]
    #[validate(custom(function = validate_color))]
    pub representative_color: String,
}

fn default_color() -> String {
    "secondary".to_string()
}

impl Default for TopicRequest {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            representative_color: default_color(),
        }
    }
}

impl TopicRequest {
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            title: topic.title.clone(),
            description: topic.description.clone(),
            representative_color: topic.representative_color.clone(),
        }
    }
}
