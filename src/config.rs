// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Maximum number of random topics shown on the home page.
pub const RANDOM_TOPICS_LIMIT: i64 = 20;

/// Page size for article, author, comment and search listings.
pub const PAGE_SIZE: i64 = 10;

/// Number of recent articles/comments inspected for trending topics and hot picks.
pub const TRENDING_WINDOW: i64 = 100;

/// Items per dashboard panel.
pub const DASHBOARD_LIMIT: i64 = 5;

/// Image used when an article or user has no upload.
pub const DEFAULT_IMAGE: &str = "images/default.png";

/// Which transport delivers outgoing email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailBackend {
    /// Relay through an SMTP server.
    Smtp,
    /// Write the message to the log.
    Console,
    /// Keep messages in memory (tests).
    Memory,
}

impl FromStr for EmailBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smtp" => Ok(EmailBackend::Smtp),
            "console" => Ok(EmailBackend::Console),
            "memory" => Ok(EmailBackend::Memory),
            other => Err(format!("unknown EMAIL_BACKEND '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Session lifetime in seconds.
    pub jwt_expiration: u64,
    /// Activation / password-reset link lifetime in seconds.
    pub token_expiration: u64,
    pub rust_log: String,
    pub log_dir: String,
    pub bind_addr: String,
    /// Absolute base URL used for links inside emails.
    pub site_url: String,
    pub media_root: String,
    pub max_upload_bytes: usize,
    pub email_backend: EmailBackend,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_from: String,
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let email_backend = env::var("EMAIL_BACKEND")
            .ok()
            .map(|v| v.parse::<EmailBackend>().expect("EMAIL_BACKEND is invalid"))
            .unwrap_or(EmailBackend::Console);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("SESSION_EXPIRATION", 1_209_600),
            token_expiration: parse_or("TOKEN_EXPIRATION", 259_200),
            rust_log: var_or("RUST_LOG", "info"),
            log_dir: var_or("LOG_DIR", "logs"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            site_url: var_or("SITE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            media_root: var_or("MEDIA_ROOT", "media"),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
            email_backend,
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: parse_or("SMTP_PORT", 587),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            mail_from: var_or("MAIL_FROM", "no-reply@blogy.com"),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid number", key)),
        Err(_) => default,
    }
}
