//! Template engine setup and page rendering.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use once_cell::sync::Lazy;
use std::convert::Infallible;
use tera::{Context, Tera};

use crate::{
    error::AppError,
    models::user::User,
    utils::{
        flash::{self, FlashMessage},
        jwt::CurrentUser,
    },
};

macro_rules! embed {
    ($($name:literal),* $(,)?) => {
        vec![$(($name, include_str!(concat!("../templates/", $name)))),*]
    };
}

/// Global template engine instance with embedded templates.
pub static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();

    tera.add_raw_templates(embed![
        "base.html",
        "macros.html",
        "error.html",
        "pages/index.html",
        "pages/articles.html",
        "pages/article.html",
        "pages/topics.html",
        "pages/topic.html",
        "pages/authors.html",
        "pages/author.html",
        "pages/search.html",
        "pages/hot_picks.html",
        "accounts/register.html",
        "accounts/register_email_confirm.html",
        "accounts/activation_invalid.html",
        "accounts/login.html",
        "accounts/password_reset_form.html",
        "accounts/password_reset_sent.html",
        "accounts/password_reset_confirm.html",
        "accounts/password_reset_complete.html",
        "accounts/dashboard.html",
        "accounts/profile.html",
        "accounts/profile_deleted.html",
        "posts/topics.html",
        "posts/topic.html",
        "posts/topic_form.html",
        "posts/articles.html",
        "posts/article.html",
        "posts/article_form.html",
        "posts/comments.html",
        "posts/comment.html",
        "posts/comment_form.html",
        "posts/likes.html",
        "admin/index.html",
        "admin/moderation.html",
        "admin/newsletters.html",
        "emails/activation.txt",
        "emails/password_reset.txt",
    ])
    .expect("Failed to load templates");

    tera
});

/// Render a template outside of a request (emails, error pages).
pub fn render(template: &str, context: &Context) -> Result<String, tera::Error> {
    TEMPLATES.render(template, context)
}

pub fn render_error_page(status: StatusCode, message: &str) -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("status", &status.as_u16());
    context.insert("reason", status.canonical_reason().unwrap_or("Error"));
    context.insert("message", message);
    render("error.html", &context)
}

/// Per-request values every page needs: the signed-in user and pending
/// flash messages.
pub struct PageContext {
    pub user: Option<User>,
    messages: Vec<FlashMessage>,
    jar: CookieJar,
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .map(|current| current.0.clone());
        let jar = CookieJar::from_headers(&parts.headers);
        let messages = flash::read(&jar);

        Ok(Self {
            user,
            messages,
            jar,
        })
    }
}

impl PageContext {
    pub fn render(self, template: &str, context: Context) -> Result<Response, AppError> {
        self.render_with_status(StatusCode::OK, template, context)
    }

    /// Renders `template` and consumes the pending flash messages.
    pub fn render_with_status(
        self,
        status: StatusCode,
        template: &str,
        mut context: Context,
    ) -> Result<Response, AppError> {
        context.insert("current_user", &self.user);
        context.insert("messages", &self.messages);

        let html = render(template, &context)?;

        if self.messages.is_empty() {
            return Ok((status, Html(html)).into_response());
        }

        let jar = self
            .jar
            .remove(Cookie::build(flash::FLASH_COOKIE).path("/"));
        Ok((status, jar, Html(html)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_parse() {
        Lazy::force(&TEMPLATES);
        assert!(TEMPLATES.get_template_names().any(|n| n == "base.html"));
    }

    #[test]
    fn error_page_mentions_status_and_message() {
        let html = render_error_page(StatusCode::NOT_FOUND, "Article not found").unwrap();
        assert!(html.contains("404"));
        assert!(html.contains("Article not found"));
    }
}
