use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

pub const CONFIG_FILE_NAME: &str = "social.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub session_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            session_file: None,
            request_timeout_secs: 15,
        }
    }
}

impl Settings {
    pub fn with_overrides(
        mut self,
        server_url: Option<String>,
        session_file: Option<PathBuf>,
        request_timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(v) = server_url {
            self.server_url = v;
        }
        if let Some(v) = session_file {
            self.session_file = Some(v);
        }
        if let Some(v) = request_timeout_secs {
            if v == 0 {
                warn!(source = "cli", "ignoring invalid request timeout");
            } else {
                self.request_timeout_secs = v;
            }
        }
        self
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE_NAME), |key| std::env::var(key).ok())
}

fn parse_timeout(raw: &str, source: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(source, value = raw, "ignoring invalid request timeout");
            None
        }
        Ok(v) => Some(v),
    }
}

fn file_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Integer(v) => Some(v.to_string()),
        _ => None,
    }
}

pub(crate) fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("server_url").and_then(file_value) {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.get("session_file").and_then(file_value) {
                    settings.session_file = Some(PathBuf::from(v));
                }
                if let Some(v) = file_cfg
                    .get("request_timeout_secs")
                    .and_then(file_value)
                    .and_then(|v| parse_timeout(&v, "config file"))
                {
                    settings.request_timeout_secs = v;
                }
            }
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring unreadable config file");
            }
        }
    }

    if let Some(v) = env("SOCIAL_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("SOCIAL_SESSION_FILE") {
        settings.session_file = Some(PathBuf::from(v));
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS").and_then(|v| parse_timeout(&v, "env")) {
        settings.request_timeout_secs = v;
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
