use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the backend on non-2xx responses.
///
/// The backend is not consistent about the shape, so every known variant is
/// accepted: `{"error": ".."}`, `{"errors": [..]}` and `{"message": ".."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Single display line, or `None` when the body carried nothing usable.
    pub fn summary(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(error) = self.error.as_deref() {
            parts.push(error);
        }
        parts.extend(self.errors.iter().map(String::as_str));
        if let Some(message) = self.message.as_deref() {
            parts.push(message);
        }
        let parts: Vec<&str> = parts
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

#[derive(Debug, Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn from_body(status: u16, body: &ApiErrorBody, fallback: &str) -> Self {
        Self::new(
            status,
            body.summary().unwrap_or_else(|| fallback.to_string()),
        )
    }
}
