// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, articles, auth, comments, likes, newsletter, pages, profile, topics},
    state::AppState,
    utils::jwt::{login_required, session_middleware, staff_required},
};

/// Assembles the main application router.
///
/// * Public pages, accounts, authoring (`/posts`) and administration (`/admin`).
/// * Uploaded media under `/media`.
/// * Session resolution runs on every request, before any route guard.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(pages::index))
        .route("/articles", get(pages::articles))
        .route("/articles/{slug}", get(pages::article))
        .route("/topics", get(pages::topics_index))
        .route("/topics/{slug}", get(pages::topic))
        .route("/authors", get(pages::authors))
        .route("/authors/{username}", get(pages::author))
        .route("/search", get(pages::search))
        .route("/hot-picks", get(pages::hot_picks))
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/unsubscribe", post(newsletter::unsubscribe));

    let account_routes = Router::new()
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/activate/{uidb64}/{token}", get(auth::activate))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route(
            "/password-reset",
            get(auth::password_reset_form).post(auth::password_reset),
        )
        .route("/password-reset/sent", get(auth::password_reset_sent))
        .route(
            "/password-reset/confirm/{uidb64}/{token}",
            get(auth::password_reset_confirm_form).post(auth::password_reset_confirm),
        )
        .route(
            "/password-reset/complete",
            get(auth::password_reset_complete),
        )
        .route("/profile/deleted", get(profile::account_deleted))
        // Protected account routes
        .merge(
            Router::new()
                .route("/dashboard", get(profile::dashboard))
                .route(
                    "/profile",
                    get(profile::profile_form).post(profile::update_profile),
                )
                .route("/profile/photo", post(profile::update_photo))
                .route("/profile/delete", post(profile::delete_account))
                .route_layer(middleware::from_fn(login_required)),
        );

    let post_routes = Router::new()
        .route("/topics", get(topics::list_topics))
        .route(
            "/topics/add",
            get(topics::add_topic_form).post(topics::add_topic),
        )
        .route("/topics/{slug}", get(topics::view_topic))
        .route(
            "/topics/{slug}/update",
            get(topics::update_topic_form).post(topics::update_topic),
        )
        .route("/topics/{slug}/delete", post(topics::delete_topic))
        .route("/articles", get(articles::list_articles))
        .route(
            "/articles/add",
            get(articles::add_article_form).post(articles::add_article),
        )
        .route("/articles/{slug}", get(articles::view_article))
        .route(
            "/articles/{slug}/update",
            get(articles::update_article_form).post(articles::update_article),
        )
        .route("/articles/{slug}/featured", post(articles::set_featured))
        .route("/articles/{slug}/delete", post(articles::delete_article))
        .route(
            "/articles/{slug}/comments/add",
            post(articles::add_comment),
        )
        .route("/comments", get(comments::list_comments))
        .route("/comments/{slug}", get(comments::view_comment))
        .route(
            "/comments/{slug}/update",
            get(comments::update_comment_form).post(comments::update_comment),
        )
        .route("/comments/{slug}/delete", post(comments::delete_comment))
        .route("/likes", get(likes::list_likes))
        .route("/likes/topics/{slug}", post(likes::like_topic))
        .route("/likes/articles/{slug}", post(likes::like_article))
        .route("/likes/comments/{slug}", post(likes::like_comment))
        .route_layer(middleware::from_fn(login_required));

    let admin_routes = Router::new()
        .route("/", get(admin::index))
        .route("/users/{username}/deactivate", post(admin::deactivate_user))
        .route("/users/{username}/restore", post(admin::restore_user))
        .route("/users/{username}/staff", post(admin::toggle_staff))
        .route("/moderation", get(admin::moderation))
        .route("/topics/{slug}/restore", post(admin::restore_topic))
        .route("/articles/{slug}/restore", post(admin::restore_article))
        .route("/comments/{slug}/restore", post(admin::restore_comment))
        .route("/newsletters", get(admin::newsletters))
        // Double middleware protection: login first, then the staff check
        .route_layer(middleware::from_fn(staff_required))
        .route_layer(middleware::from_fn(login_required));

    let media = ServeDir::new(&state.config.media_root);
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(public_routes)
        .nest("/accounts", account_routes)
        .nest("/posts", post_routes)
        .nest("/admin", admin_routes)
        .nest_service("/media", media)
        .fallback(pages::not_found)
        // Global Middleware (applied from outside in)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .with_state(state)
}
