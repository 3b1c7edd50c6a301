//! Persisted login state (cookies + localStorage) and the lock guarding it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to read session file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Session file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write session file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Session file {path} is locked by another run (lock file {lock})")]
    Locked { path: String, lock: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Seconds since the epoch; zero or negative for session cookies.
    #[serde(default = "default_expires")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_expires() -> f64 {
    -1.0
}

impl SnapshotCookie {
    pub fn is_session_cookie(&self) -> bool {
        self.expires <= 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub cookies: Vec<SnapshotCookie>,
    #[serde(rename = "localStorage", default)]
    pub local_storage: BTreeMap<String, String>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.local_storage.is_empty()
    }
}

pub const DEFAULT_LOCK_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    stale_after: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: DEFAULT_LOCK_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Load the saved snapshot. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<SessionSnapshot>, SessionError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionError::Read {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        let snapshot = serde_json::from_str(&content).map_err(|source| SessionError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot to a temp file next to the target, then rename it into place.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let write_err = |source| SessionError::Write {
            path: self.path.display().to_string(),
            source,
        };
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| write_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::info!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Take the exclusive session lock for the duration of a run.
    ///
    /// A lock file older than the staleness window is assumed to belong to a
    /// crashed run and is replaced.
    pub fn lock(&self) -> Result<SessionLock, SessionError> {
        let lock_path = self.lock_path();
        if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SessionError::Write {
                path: lock_path.display().to_string(),
                source,
            })?;
        }

        match create_lock_file(&lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !self.is_stale(&lock_path) {
                    return Err(SessionError::Locked {
                        path: self.path.display().to_string(),
                        lock: lock_path.display().to_string(),
                    });
                }
                tracing::warn!("Replacing stale session lock {}", lock_path.display());
                let _ = fs::remove_file(&lock_path);
                create_lock_file(&lock_path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => SessionError::Locked {
                        path: self.path.display().to_string(),
                        lock: lock_path.display().to_string(),
                    },
                    _ => SessionError::Write {
                        path: lock_path.display().to_string(),
                        source: e,
                    },
                })?;
            }
            Err(source) => {
                return Err(SessionError::Write {
                    path: lock_path.display().to_string(),
                    source,
                });
            }
        }

        tracing::debug!("Acquired session lock {}", lock_path.display());
        Ok(SessionLock { path: lock_path })
    }

    fn is_stale(&self, lock_path: &Path) -> bool {
        fs::metadata(lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age >= self.stale_after)
    }
}

fn create_lock_file(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())
}

/// Held while a run owns the session file. Dropping it removes the lock file.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Failed to remove session lock {}: {}", self.path.display(), e);
        }
    }
}
