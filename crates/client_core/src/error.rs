use shared::error::ApiException;
use thiserror::Error;

use crate::validation::ValidationErrors;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("{0} is not loaded")]
    NotLoaded(&'static str),
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("session storage error: {0}")]
    Session(String),
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<ApiException> for ClientError {
    fn from(value: ApiException) -> Self {
        Self::Status {
            status: value.status,
            message: value.message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Validation,
    Transport,
    Server,
    Unknown,
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotSignedIn => ErrorCategory::Auth,
            Self::Status { status, .. } if matches!(*status, 401 | 403) => ErrorCategory::Auth,
            Self::Status { status, .. } if matches!(*status, 400 | 409 | 422) => {
                ErrorCategory::Validation
            }
            Self::Status { status, .. } if *status >= 500 => ErrorCategory::Server,
            Self::Status { .. } => ErrorCategory::Unknown,
            Self::Validation(_) | Self::NotLoaded(_) => ErrorCategory::Validation,
            Self::Network(_) => ErrorCategory::Transport,
            Self::Decode(_) => ErrorCategory::Server,
            Self::Session(_) | Self::InvalidUrl(_) => ErrorCategory::Unknown,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    /// Plain text shown on the page that issued the failing request.
    pub fn display_message(&self) -> String {
        match self {
            Self::NotSignedIn => "You need to sign in first.".to_string(),
            Self::NotLoaded(what) => format!("The {what} has not been loaded yet."),
            Self::Validation(errors) => errors.to_string(),
            Self::Status { message, .. } => message.clone(),
            Self::Network(err) if err.is_timeout() => {
                "The server took too long to respond.".to_string()
            }
            Self::Network(err) => format!("Could not reach the server: {err}"),
            Self::Decode(_) => "The server sent a response that could not be read.".to_string(),
            Self::Session(message) => format!("Could not access the saved session: {message}"),
            Self::InvalidUrl(err) => format!("Invalid server address: {err}"),
        }
    }
}
