//! Client-side checks run before a form is submitted.
//!
//! Every check reports all failing fields at once. On success the returned
//! request body carries trimmed values, ready to send.

use std::fmt;

use shared::protocol::{
    LoginRequest, NewMessage, NewPost, ProfileUpdate, RegisterRequest, UserUpdate,
};
use url::Url;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const POST_MAX_CHARS: usize = 280;
pub const MESSAGE_MAX_CHARS: usize = 1000;
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;
pub const BIO_MAX_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// First message recorded against `field`.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Raw registration form fields as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_username(errors: &mut ValidationErrors, username: &str) {
    let len = char_len(username);
    if len == 0 {
        errors.push("username", "can't be blank");
    } else if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        errors.push(
            "username",
            format!("must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
        );
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push(
            "username",
            "may only contain letters, digits and underscores",
        );
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.push("email", "can't be blank");
    } else if !is_valid_email(email) {
        errors.push("email", "is not a valid email address");
    }
}

fn check_web_url(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(field, "must be an http or https URL"),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string())
}

pub fn validate_login(username: &str, password: &str) -> Result<LoginRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let username = username.trim();
    if username.is_empty() {
        errors.push("username", "can't be blank");
    }
    if password.trim().is_empty() {
        errors.push("password", "can't be blank");
    }
    errors.finish(LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

pub fn validate_registration(
    input: &RegistrationInput,
) -> Result<RegisterRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let username = input.username.trim();
    let email = input.email.trim();
    check_username(&mut errors, username);
    check_email(&mut errors, email);
    if char_len(&input.password) < PASSWORD_MIN_CHARS {
        errors.push(
            "password",
            format!("must be at least {PASSWORD_MIN_CHARS} characters"),
        );
    }
    if input.password != input.password_confirmation {
        errors.push("password_confirmation", "doesn't match password");
    }
    errors.finish(RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: input.password.clone(),
    })
}

pub fn validate_post(content: &str) -> Result<NewPost, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let content = content.trim();
    if content.is_empty() {
        errors.push("content", "can't be blank");
    } else if char_len(content) > POST_MAX_CHARS {
        errors.push(
            "content",
            format!("is too long (maximum is {POST_MAX_CHARS} characters)"),
        );
    }
    errors.finish(NewPost {
        content: content.to_string(),
    })
}

pub fn validate_message(body: &str) -> Result<NewMessage, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let body = body.trim();
    if body.is_empty() {
        errors.push("body", "can't be blank");
    } else if char_len(body) > MESSAGE_MAX_CHARS {
        errors.push(
            "body",
            format!("is too long (maximum is {MESSAGE_MAX_CHARS} characters)"),
        );
    }
    errors.finish(NewMessage {
        body: body.to_string(),
    })
}

pub fn validate_profile_update(update: ProfileUpdate) -> Result<ProfileUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let update = ProfileUpdate {
        display_name: trimmed(update.display_name),
        bio: trimmed(update.bio),
        avatar_url: trimmed(update.avatar_url),
        website: trimmed(update.website),
    };
    if update.is_empty() {
        errors.push("profile", "nothing to update");
    }
    if let Some(display_name) = &update.display_name {
        if char_len(display_name) > DISPLAY_NAME_MAX_CHARS {
            errors.push(
                "display_name",
                format!("is too long (maximum is {DISPLAY_NAME_MAX_CHARS} characters)"),
            );
        }
    }
    if let Some(bio) = &update.bio {
        if char_len(bio) > BIO_MAX_CHARS {
            errors.push(
                "bio",
                format!("is too long (maximum is {BIO_MAX_CHARS} characters)"),
            );
        }
    }
    if let Some(avatar_url) = update.avatar_url.as_deref().filter(|v| !v.is_empty()) {
        check_web_url(&mut errors, "avatar_url", avatar_url);
    }
    if let Some(website) = update.website.as_deref().filter(|v| !v.is_empty()) {
        check_web_url(&mut errors, "website", website);
    }
    errors.finish(update)
}

pub fn validate_user_update(update: UserUpdate) -> Result<UserUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let update = UserUpdate {
        username: trimmed(update.username),
        email: trimmed(update.email),
    };
    if update.is_empty() {
        errors.push("user", "nothing to update");
    }
    if let Some(username) = &update.username {
        check_username(&mut errors, username);
    }
    if let Some(email) = &update.email {
        check_email(&mut errors, email);
    }
    errors.finish(update)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
