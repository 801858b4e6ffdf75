// tests/pages_tests.rs
//
// Public pages driven straight through the router, without a listening socket.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use blogy::{
    config::{Config, EmailBackend},
    db,
    mail::MemoryMailer,
    routes,
    state::AppState,
    utils::media,
};
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestRouter {
    router: Router,
    _dir: TempDir,
}

impl TestRouter {
    async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database_url = format!("sqlite://{}", dir.path().join("pages.db").display());
        let media_root = dir.path().join("media").display().to_string();

        let pool = db::connect(&database_url).await.expect("Failed to open database");
        db::migrate(&pool).await.expect("Failed to migrate database");
        media::ensure_default_image(&media_root)
            .await
            .expect("Failed to prepare media root");

        let config = Config {
            database_url,
            jwt_secret: "pages_test_secret".to_string(),
            jwt_expiration: 600,
            token_expiration: 600,
            rust_log: "error".to_string(),
            log_dir: dir.path().join("logs").display().to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            site_url: "http://localhost".to_string(),
            media_root,
            max_upload_bytes: 1024 * 1024,
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

        let state = AppState {
            pool,
            config,
            mailer: Arc::new(MemoryMailer::new()),
        };

        Self {
            router: routes::create_router(state),
            _dir: dir,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .expect("oneshot failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[tokio::test]
async fn empty_site_pages_render() {
    let app = TestRouter::new().await;

    for uri in ["/", "/articles", "/topics", "/authors", "/hot-picks", "/search?q=rust"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK, "GET {}", uri);
        assert!(body.contains("<html"), "GET {} did not render a page", uri);
    }
}

#[tokio::test]
async fn account_forms_render_for_anonymous_visitors() {
    let app = TestRouter::new().await;

    for uri in ["/accounts/register", "/accounts/login", "/accounts/password-reset"] {
        let (status, _) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK, "GET {}", uri);
    }
}

#[tokio::test]
async fn missing_content_is_404() {
    let app = TestRouter::new().await;

    for uri in ["/articles/nope", "/topics/nope", "/authors/nobody"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {}", uri);
        assert!(body.contains("404"));
    }
}

#[tokio::test]
async fn default_image_is_served() {
    let app = TestRouter::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/media/images/default.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn garbage_session_cookie_is_anonymous() {
    let app = TestRouter::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/accounts/dashboard")
                .header(header::COOKIE, "blogy_session=not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
