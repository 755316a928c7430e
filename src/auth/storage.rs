//! Persistence for the current session and its local user mirror.
//!
//! DESIGN
//! ======
//! Storage is a trait so the store can be exercised in memory while the CLI
//! keeps sessions in a JSON file between runs. A corrupt file reads as "no
//! session" rather than an error: the user signs in again instead of being
//! stuck behind a parse failure.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, AuthResult, AuthUser, Session};

/// Basic user attributes cached next to the session for quick display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMirror {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl UserMirror {
    #[must_use]
    pub fn from_user(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name(),
            avatar_url: user.avatar_url().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    #[serde(default)]
    pub user_mirror: Option<UserMirror>,
}

impl StoredSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        let user_mirror = Some(UserMirror::from_user(&session.user));
        Self { session, user_mirror }
    }
}

pub trait SessionStorage: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the backing medium cannot be read.
    fn load(&self) -> AuthResult<Option<StoredSession>>;

    /// # Errors
    ///
    /// Returns an error when the backing medium cannot be written.
    fn save(&self, stored: &StoredSession) -> AuthResult<()>;

    /// Remove the session and every cached user attribute.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing medium cannot be cleared.
    fn clear(&self) -> AuthResult<()>;
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<StoredSession>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { slot: Mutex::new(Some(StoredSession::new(session))) }
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> AuthResult<Option<StoredSession>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, stored: &StoredSession) -> AuthResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(stored.clone());
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> AuthResult<Option<StoredSession>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, stored: &StoredSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(stored).map_err(|e| AuthError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn clear(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
