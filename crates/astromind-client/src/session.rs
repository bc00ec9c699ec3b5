//! Session state: the cached token and user, owned by one service.

use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::api::{ApiError, Credentials, ReportBackend, User};

/// Route every consumer is sent to when the session expires
pub const ENTRY_ROUTE: &str = "/";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Persistence for the cached session
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    /// Remove both the token and the user.
    fn clear(&self) -> Result<(), SessionError>;
}

/// On-disk layout. Either key alone does not make a session.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// JSON file holding the `token` and `user` keys
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub const FILE_NAME: &'static str = "session.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store inside a data directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: SessionFile = serde_json::from_str(&text)?;
        Ok(match (file.token, file.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some(Session { token, user }),
            _ => None,
        })
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let file = SessionFile {
            token: Some(session.token.clone()),
            user: Some(session.user.clone()),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-process store
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Outcome of checking the cached session against the backend
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// `/me` confirmed the token; the cached user was refreshed
    Active(User),
    /// Backend unavailable; the cached user is kept
    Offline(User),
    /// Session cleared; navigate to `redirect`
    Expired { redirect: &'static str },
}

/// Single owner of the cached session
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn get_session(&self) -> Option<Session> {
        match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                log::error!("could not read session: {}", e);
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.get_session().map(|s| s.token)
    }

    pub fn set_session(&self, session: Session) -> Result<(), SessionError> {
        self.store.save(&session)
    }

    /// Drop the token and the user. Failures are logged, never raised.
    pub fn clear_session(&self) {
        log::info!("clearing session");
        if let Err(e) = self.store.clear() {
            log::error!("could not clear session: {}", e);
        }
    }

    /// Clear the session and return the route to navigate to.
    pub fn expire(&self) -> &'static str {
        self.clear_session();
        ENTRY_ROUTE
    }

    pub async fn login<B>(&self, backend: &B, credentials: &Credentials) -> Result<User, ApiError>
    where
        B: ReportBackend + ?Sized,
    {
        let auth = backend.login(credentials).await?;
        let session = Session {
            token: auth.access_token,
            user: auth.user.clone(),
        };
        if let Err(e) = self.set_session(session) {
            log::error!("could not persist session: {}", e);
        }
        Ok(auth.user)
    }

    /// Confirm the cached session with `/me`.
    pub async fn verify<B>(&self, backend: &B) -> SessionStatus
    where
        B: ReportBackend + ?Sized,
    {
        let Some(session) = self.get_session() else {
            return SessionStatus::Expired {
                redirect: self.expire(),
            };
        };

        match backend.me(&session.token).await {
            Ok(user) => {
                let refreshed = Session {
                    token: session.token,
                    user: user.clone(),
                };
                if let Err(e) = self.set_session(refreshed) {
                    log::error!("could not persist refreshed user: {}", e);
                }
                SessionStatus::Active(user)
            }
            Err(e) if e.is_unauthorized() => {
                log::warn!("session rejected by backend: {}", e);
                SessionStatus::Expired {
                    redirect: self.expire(),
                }
            }
            Err(e) => {
                log::warn!("session check failed, keeping cached user: {}", e);
                SessionStatus::Offline(session.user)
            }
        }
    }
}

/// Liveness flag for a view. Results that arrive after teardown are dropped.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    alive: Arc<AtomicBool>,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGuard {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Await `fut`, keeping its output only if the view is still alive.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_alive() {
            Some(output)
        } else {
            log::debug!("view torn down, dropping result");
            None
        }
    }
}
