use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Convert text to a URL-friendly slug.
///
/// Non-ASCII characters are dropped, then anything that is not a letter,
/// digit, underscore, hyphen or whitespace. Runs of whitespace and hyphens
/// become a single hyphen.
///
/// ```
/// use blogy::utils::slug::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("  Rust & Go -- 2024 "), "rust-go-2024");
/// ```
pub fn slugify(text: &str) -> String {
    let ascii: String = text.chars().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let cleaned = DISALLOWED.replace_all(&lowered, "");
    SEPARATORS
        .replace_all(&cleaned, "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

/// Current UTC time with microseconds, appended to slug sources so that
/// two articles or comments with the same title still differ.
pub fn timestamp_suffix() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub fn topic_slug(title: &str) -> String {
    slugify(title)
}

pub fn article_slug(title: &str, topic_title: &str) -> String {
    slugify(&format!("{}{}{}", title, topic_title, timestamp_suffix()))
}

pub fn comment_slug(title: &str, article_slug: &str) -> String {
    slugify(&format!("{}{}{}", title, article_slug, timestamp_suffix()))
}

pub fn like_slug(username: &str, target_slug: &str) -> String {
    slugify(&format!("{}{}{}", username, target_slug, timestamp_suffix()))
}
