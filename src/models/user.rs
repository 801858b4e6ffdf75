// src/models/user.rs

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::{Validate, ValidationError};

use crate::utils::form::{FormErrors, checkbox};

/// Column list matching [`User`], for `SELECT {USER_COLUMNS} FROM users`.
pub const USER_COLUMNS: &str = "id, username, email, name, password, phone, photo, about_me, \
     web, instagram, twitter, is_active, is_staff, last_login, created_at, updated_at, deleted_at";

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    /// Unique, stored lower-case.
    pub username: String,

    pub email: String,

    pub name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub phone: Option<String>,

    /// Path below the media root.
    pub photo: String,

    pub about_me: Option<String>,
    pub web: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,

    /// False until the activation link is followed, and again after a soft delete.
    pub is_active: bool,

    pub is_staff: bool,

    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Owners and staff may change or remove content.
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.id == owner_id || self.is_staff
    }
}

/// Author listing row with public activity counts.
#[derive(Debug, Serialize, FromRow)]
pub struct AuthorCard {
    pub username: String,
    pub name: String,
    pub photo: String,
    pub about_me: Option<String>,
    pub created_at: DateTime<Utc>,
    pub articles_count: i64,
}

fn message(code: &'static str, text: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(text))
}

/// Letters, digits, underscores and hyphens only.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(message(
            "invalid_username",
            "Username may only contain letters, digits, underscores and hyphens.",
        ))
    }
}

/// Blank is allowed; anything else must parse as an absolute URL.
fn validate_optional_url(url: &str) -> Result<(), ValidationError> {
    if url.trim().is_empty() || Url::parse(url.trim()).is_ok() {
        Ok(())
    } else {
        Err(message("invalid_url", "Enter a valid URL."))
    }
}

/// DTO for creating a new account (Registration).
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(
            min = 4,
            max = 50,
            message = "Username length must be between 4 and 50 characters."
        ),
        custom(function = validate_username)
    )]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)."))]
    pub name: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters."))]
    pub password: String,

    #[serde(skip_serializing)]
    pub password2: String,
}

impl RegisterRequest {
    /// Field checks plus the password confirmation.
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = self
            .validate()
            .err()
            .map(FormErrors::from)
            .unwrap_or_default();
        if self.password != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors
    }
}

/// DTO for user login.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254, message = "Enter your username or email."))]
    pub username: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 1, max = 128, message = "Enter your password."))]
    pub password: String,

    /// Checkbox: present ("on") when ticked.
    pub remember_me: Option<String>,

    pub next: Option<String>,
}

impl LoginRequest {
    pub fn remember(&self) -> bool {
        checkbox(&self.remember_me)
    }
}

/// DTO for requesting a password-reset email.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

/// DTO for choosing a new password from a reset link.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct SetPasswordRequest {
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters."))]
    pub new_password1: String,
    pub new_password2: String,
}

impl SetPasswordRequest {
    pub fn form_errors(&self) -> FormErrors {
        let mut errors = self
            .validate()
            .err()
            .map(FormErrors::from)
            .unwrap_or_default();
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match.");
        }
        errors
    }
}

/// DTO for editing the current user's profile. Username cannot change.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)."))]
    pub name: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(max = 20, message = "Phone number is too long."))]
    pub phone: Option<String>,

    #[validate(length(max = 100, message = "About me must be at most 100 characters."))]
    pub about_me: Option<String>,

    #[validate(custom(function = validate_optional_url))]
    pub web: Option<String>,

    #[validate(custom(function = validate_optional_url))]
    pub instagram: Option<String>,

    #[validate(custom(function = validate_optional_url))]
    pub twitter: Option<String>,
}

impl UpdateProfileRequest {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            about_me: user.about_me.clone(),
            web: user.web.clone(),
            instagram: user.instagram.clone(),
            twitter: user.twitter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            username: "new_writer".into(),
            email: "writer@example.com".into(),
            name: "New Writer".into(),
            password: "long enough".into(),
            password2: "long enough".into(),
        }
    }

    #[test]
    fn valid_registration_has_no_errors() {
        assert!(registration().form_errors().is_empty());
    }

    #[test]
    fn mismatched_passwords_are_reported() {
        let mut form = registration();
        form.password2 = "something else".into();
        let errors = form.form_errors();
        assert!(errors.contains("password2"));
        assert!(!errors.contains("password"));
    }

    #[test]
    fn username_rules() {
        let mut form = registration();
        form.username = "abc".into();
        assert!(form.form_errors().contains("username"));

        form.username = "has space".into();
        assert!(form.form_errors().contains("username"));

        form.username = "ok-name_1".into();
        assert!(form.form_errors().is_empty());
    }

    #[test]
    fn profile_urls_may_be_blank_but_not_garbage() {
        let mut form = UpdateProfileRequest {
            name: "Writer".into(),
            email: "writer@example.com".into(),
            web: Some(String::new()),
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        form.twitter = Some("not a url".into());
        assert!(form.validate().is_err());

        form.twitter = Some("https://twitter.com/writer".into());
        assert!(form.validate().is_ok());
    }

    #[test]
    fn can_manage_is_owner_or_staff() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            username: "owner".into(),
            email: "o@example.com".into(),
            name: "Owner".into(),
            password: String::new(),
            phone: None,
            photo: "images/default.png".into(),
            about_me: None,
            web: None,
            instagram: None,
            twitter: None,
            is_active: true,
            is_staff: false,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(user.can_manage(1));
        assert!(!user.can_manage(2));
        user.is_staff = true;
        assert!(user.can_manage(2));
    }
}
