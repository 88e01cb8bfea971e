//! Signed-in session: created by `login`, passed explicitly into every
//! protected command, torn down by `logout`.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a remembered session.
pub const REMEMBERED_TTL_DAYS: i64 = 30;

/// Lifetime of a session without "remember me".
pub const SHORT_TTL_HOURS: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: String,
    pub remember_me: bool,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = if self.remember_me {
            TimeDelta::days(REMEMBERED_TTL_DAYS)
        } else {
            TimeDelta::hours(SHORT_TTL_HOURS)
        };
        self.signed_in_at + ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// JSON file holding the current session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("session.json"),
        }
    }

    /// Load the stored session. Expired or unreadable sessions are dropped.
    pub fn load(&self, now: DateTime<Utc>) -> Option<Session> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "cannot read session: {e}");
                return None;
            }
        };
        let session: Session = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "discarding corrupt session: {e}");
                return None;
            }
        };
        if session.is_expired(now) {
            tracing::info!(email = %session.email, "stored session expired");
            return None;
        }
        Some(session)
    }

    pub fn save(&self, session: &Session) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(session).map_err(io::Error::other)?;
        std::fs::write(&self.path, json)
    }

    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
