// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use blogy::{
    config::{Config, EmailBackend},
    db,
    mail::MemoryMailer,
    routes,
    state::AppState,
    utils::media,
};
use reqwest::{Client, Response, redirect::Policy};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PASSWORD: &str = "s3cure-passw0rd";

/// A running server backed by its own SQLite file and media directory.
pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub mailer: MemoryMailer,
    pub config: Config,
    _dir: TempDir,
}

/// Helper function to spawn the app on a random port for testing.
pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("blogy.db").display());
    let media_root = dir.path().join("media").display().to_string();

    // 1. Create a pool on a fresh database
    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open test database");

    // 2. Run migrations
    db::migrate(&pool).await.expect("Failed to migrate database");
    media::ensure_default_image(&media_root)
        .await
        .expect("Failed to prepare media root");

    // 3. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 4. Create test configuration and state
    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        token_expiration: 600,
        rust_log: "error".to_string(),
        log_dir: dir.path().join("logs").display().to_string(),
        bind_addr: format!("127.0.0.1:{}", port),
        site_url: address.clone(),
        media_root,
        max_upload_bytes: 2 * 1024 * 1024,
        email_backend: EmailBackend::Memory,
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        mail_from: "no-reply@blogy.test".to_string(),
        admin_username: None,
        admin_email: None,
        admin_password: None,
    };

    let mailer = MemoryMailer::new();
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        mailer: Arc::new(mailer.clone()),
    };

    let app = routes::create_router(state);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        mailer,
        config,
        _dir: dir,
    }
}

/// Browser-like client: keeps cookies, does not follow redirects.
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to build client")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("response has no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, client: &Client, path: &str) -> Response {
        client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_form(&self, client: &Client, path: &str, form: &[(&str, &str)]) -> Response {
        client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn register(&self, client: &Client, username: &str, email: &str) -> Response {
        self.post_form(
            client,
            "/accounts/register",
            &[
                ("username", username),
                ("email", email),
                ("name", &format!("{} Writer", username)),
                ("password", PASSWORD),
                ("password2", PASSWORD),
            ],
        )
        .await
    }

    /// The path of the last link mailed to `email`.
    pub fn last_link_for(&self, email: &str) -> String {
        let message = self
            .mailer
            .outbox()
            .into_iter()
            .rev()
            .find(|m| m.to == email)
            .expect("no email was sent to this address");
        let line = message
            .body
            .lines()
            .find(|l| l.starts_with(&self.address))
            .expect("email contains no link")
            .trim();
        line[self.address.len()..].to_string()
    }

    /// Registers and activates an account. The returned client is signed in.
    pub async fn signed_in_user(&self, username: &str) -> Client {
        let client = client();
        let email = format!("{}@example.com", username);
        let response = self.register(&client, username, &email).await;
        assert_eq!(response.status().as_u16(), 200);

        let link = self.last_link_for(&email);
        let response = self.get(&client, &link).await;
        assert_eq!(response.status().as_u16(), 303);
        client
    }

    pub async fn signed_in_staff(&self, username: &str) -> Client {
        let client = self.signed_in_user(username).await;
        sqlx::query("UPDATE users SET is_staff = 1 WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .unwrap();
        client
    }

    pub async fn login(&self, client: &Client, username: &str, password: &str) -> Response {
        self.post_form(
            client,
            "/accounts/login",
            &[("username", username), ("password", password)],
        )
        .await
    }

    /// Creates a topic through the authoring form and returns its slug.
    pub async fn create_topic(&self, client: &Client, title: &str) -> String {
        let response = self
            .post_form(
                client,
                "/posts/topics/add",
                &[
                    ("title", title),
                    ("description", "All about it"),
                    ("representative_color", "primary"),
                ],
            )
            .await;
        assert_eq!(response.status().as_u16(), 303, "topic was not created");

        sqlx::query_scalar("SELECT slug FROM topics WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn topic_id(&self, slug: &str) -> i64 {
        sqlx::query_scalar("SELECT id FROM topics WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn post_article(
        &self,
        client: &Client,
        title: &str,
        body: &str,
        topic_id: i64,
    ) -> Response {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("body", body.to_string())
            .text("topic", topic_id.to_string());
        client
            .post(self.url("/posts/articles/add"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_article_update(
        &self,
        client: &Client,
        slug: &str,
        title: &str,
        topic_id: i64,
    ) -> Response {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("body", "<p>Updated</p>")
            .text("topic", topic_id.to_string());
        client
            .post(self.url(&format!("/posts/articles/{}/update", slug)))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Creates an article through the authoring form and returns its slug.
    pub async fn create_article(
        &self,
        client: &Client,
        title: &str,
        body: &str,
        topic_id: i64,
    ) -> String {
        let response = self.post_article(client, title, body, topic_id).await;
        assert_eq!(response.status().as_u16(), 303, "article was not created");

        sqlx::query_scalar("SELECT slug FROM articles WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Adds a comment and returns its slug.
    pub async fn create_comment(&self, client: &Client, article_slug: &str, title: &str) -> String {
        let response = self
            .post_form(
                client,
                &format!("/posts/articles/{}/comments/add", article_slug),
                &[("title", title), ("body", "Well said.")],
            )
            .await;
        assert_eq!(response.status().as_u16(), 303, "comment was not created");

        sqlx::query_scalar("SELECT slug FROM comments WHERE title = ? ORDER BY id DESC LIMIT 1")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}
