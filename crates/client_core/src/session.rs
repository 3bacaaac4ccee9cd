//! Persistence of the signed-in session (bearer token and user id).

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use shared::domain::Session;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

const APP_DIR_NAME: &str = "proto_social";
const SESSION_FILE_NAME: &str = "session.json";

pub trait SessionStore: Send + Sync {
    fn load(&self) -> ClientResult<Option<Session>>;
    fn save(&self, session: &Session) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_local_dir>/proto_social/session.json`
    pub fn default_path() -> ClientResult<PathBuf> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            ClientError::Session("unable to resolve local app data dir".to_string())
        })?;
        Ok(base.join(APP_DIR_NAME).join(SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, err: io::Error) -> ClientError {
    ClientError::Session(format!("{}: {err}", path.display()))
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> ClientResult<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&self.path, err)),
        };
        let session = serde_json::from_str::<Session>(&raw).map_err(|err| {
            ClientError::Session(format!("{}: {err}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), user_id = session.user_id.0, "loaded session");
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
            }
        }
        let raw = serde_json::to_string_pretty(session)
            .map_err(|err| ClientError::Session(err.to_string()))?;
        fs::write(&self.path, raw).map_err(|err| io_error(&self.path, err))?;
        info!(path = %self.path.display(), user_id = session.user_id.0, "saved session");
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "cleared session");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&self.path, err)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    fn lock(&self) -> ClientResult<std::sync::MutexGuard<'_, Option<Session>>> {
        self.inner
            .lock()
            .map_err(|_| ClientError::Session("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> ClientResult<Option<Session>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &Session) -> ClientResult<()> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
