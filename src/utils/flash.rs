//! One-shot messages carried across a redirect in a cookie.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "blogy_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

pub fn encode(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_vec(messages).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Tampered or stale cookies decode to no messages.
pub fn decode(raw: &str) -> Vec<FlashMessage> {
    URL_SAFE_NO_PAD
        .decode(raw)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

pub fn read(jar: &CookieJar) -> Vec<FlashMessage> {
    jar.get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default()
}

pub fn cookie(messages: &[FlashMessage]) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, encode(messages)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Redirect (303) and show `text` on the next rendered page.
pub fn redirect(to: &str, level: Level, text: impl Into<String>) -> Response {
    let jar = CookieJar::new().add(cookie(&[FlashMessage::new(level, text)]));
    (jar, Redirect::to(to)).into_response()
}

/// Same as [`redirect`] but keeps the cookies already staged in `jar`.
pub fn redirect_with(jar: CookieJar, to: &str, level: Level, text: impl Into<String>) -> Response {
    let jar = jar.add(cookie(&[FlashMessage::new(level, text)]));
    (jar, Redirect::to(to)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_survive_the_cookie_codec() {
        let messages = vec![
            FlashMessage::new(Level::Success, "World Events added"),
            FlashMessage::new(Level::Warning, "semi;colons, commas = fine"),
        ];
        assert_eq!(decode(&encode(&messages)), messages);
    }

    #[test]
    fn garbage_cookie_yields_nothing() {
        assert!(decode("not base64 at all!").is_empty());
        assert!(decode(&URL_SAFE_NO_PAD.encode(b"{\"level\":")).is_empty());
    }

    #[test]
    fn redirect_sets_location_and_cookie() {
        let response = redirect("/accounts/dashboard", Level::Info, "hello");
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/accounts/dashboard"
        );
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with(FLASH_COOKIE));
    }
}
