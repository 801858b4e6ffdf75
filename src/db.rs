// src/db.rs

use std::{str::FromStr, time::Duration};

use chrono::Utc;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{config::Config, error::AppError, utils::hash::hash_password};

/// Opens the SQLite database (creating the file if needed) with foreign keys on.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
}

/// Connects, retrying a few times while the database comes up.
pub async fn connect_with_retry(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match connect(database_url).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates the configured staff account if it does not exist yet.
pub async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let username = username.to_lowercase();
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(&username)
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        tracing::info!("Seeding admin user: {}", username);
        let hashed_password = hash_password(password)?;
        let email = config
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", username));
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (username, email, name, password, is_active, is_staff, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, 1, ?, ?)",
        )
        .bind(&username)
        .bind(&email)
        .bind(&username)
        .bind(&hashed_password)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        tracing::info!("Admin user created successfully.");
    }

    Ok(())
}
