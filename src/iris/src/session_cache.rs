// Copyright 2026 The asc-rs Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persists web sessions across invocations.
//!
//! Signing in requires an SRP handshake and, for most accounts, a
//! two-factor code. The cache keeps the session cookies on disk so later
//! invocations can skip both:
//!
//! ```text
//! ~/.asc/iris/
//!   session-<sha256(account)>.json   {"version":1,"updated_at":..,"cookies":{<base url>:[..]}}
//!   last.json                        {"version":1,"key":<sha256(account)>}
//! ```
//!
//! Files are only readable by the current user. A cached session is only
//! returned after the server accepts it; any failure to read, parse or
//! validate a cached session is a cache miss.

use crate::cookies::{CookieJar, StoredCookie};
use crate::errors::{Error, Result};
use crate::login::{Endpoints, Session};
use asc_client::diagnostics::{Diagnostics, Stderr};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Set to a falsy value (`0`, `false`, `no`, `off`) to disable the cache.
pub const ENABLED_ENV: &str = "ASC_IRIS_SESSION_CACHE";
/// Overrides the cache directory.
pub const DIR_ENV: &str = "ASC_IRIS_SESSION_CACHE_DIR";

const VERSION: u32 = 1;
const LAST_FILE: &str = "last.json";

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    version: u32,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    #[serde(default)]
    cookies: BTreeMap<String, Vec<StoredCookie>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Last {
    version: u32,
    key: String,
}

/// The on-disk web session cache.
#[derive(Clone, Debug)]
pub struct SessionCache {
    dir: PathBuf,
    enabled: bool,
    endpoints: Arc<Endpoints>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl SessionCache {
    /// A cache in `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
            endpoints: Arc::new(Endpoints::default()),
            diagnostics: Arc::new(Stderr),
        }
    }

    /// Configures the cache from `ASC_IRIS_SESSION_CACHE` and
    /// `ASC_IRIS_SESSION_CACHE_DIR`.
    pub fn from_env() -> Result<Self> {
        let enabled = std::env::var(ENABLED_ENV)
            .map(|v| !asc_client::is_falsy(&v))
            .unwrap_or(true);
        let dir = match std::env::var(DIR_ENV) {
            Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
            _ => dirs::home_dir()
                .ok_or_else(|| Error::usage("cannot find the home directory for the session cache"))?
                .join(".asc")
                .join("iris"),
        };
        Ok(Self::new(dir).with_enabled(enabled))
    }

    pub fn with_enabled(mut self, v: bool) -> Self {
        self.enabled = v;
        self
    }

    /// The endpoints used by resumed sessions.
    pub fn with_endpoints(mut self, v: Endpoints) -> Self {
        self.endpoints = Arc::new(v);
        self
    }

    pub fn with_diagnostics<D: Diagnostics + 'static>(mut self, v: D) -> Self {
        self.diagnostics = Arc::new(v);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Saves the cookies of `session` and marks it as the last session.
    pub async fn persist(&self, session: &Session) -> Result<()> {
        if !self.enabled || session.account.is_empty() {
            return Ok(());
        }
        let now = OffsetDateTime::now_utc();
        let urls = session.endpoints().cookie_urls();
        let cookies = session
            .cookie_jar()
            .snapshot(&urls, now)
            .into_iter()
            .map(|(url, cookies)| (url.to_string(), cookies))
            .collect();
        let record = Record {
            version: VERSION,
            updated_at: now,
            cookies,
        };
        let key = cache_key(&session.account);
        self.create_dir().await?;
        let contents = serde_json::to_vec_pretty(&record).map_err(Error::cache_format)?;
        let path = self.session_path(&key);
        write_atomic(&path, &contents).await?;
        let last = serde_json::to_vec(&Last { version: VERSION, key }).map_err(Error::cache_format)?;
        write_atomic(&self.dir.join(LAST_FILE), &last).await?;
        tracing::debug!(path = %path.display(), "persisted web session");
        Ok(())
    }

    /// Resumes the cached session of `account`.
    ///
    /// Returns `None` on a cache miss, including when the server rejects the
    /// cached cookies.
    pub async fn resume(&self, account: &str) -> Option<Session> {
        let account = account.trim();
        if !self.enabled || account.is_empty() {
            return None;
        }
        self.resume_key(&cache_key(account), account).await
    }

    /// Resumes the most recently persisted session.
    pub async fn resume_last(&self) -> Option<Session> {
        if !self.enabled {
            return None;
        }
        let last = match read_json::<Last>(&self.dir.join(LAST_FILE)).await {
            Ok(Some(last)) if last.version == VERSION && !last.key.is_empty() => last,
            Ok(_) => return None,
            Err(e) => {
                tracing::debug!("ignoring the last session marker: {e}");
                return None;
            }
        };
        let mut session = self.resume_key(&last.key, "").await?;
        if session.account.is_empty() {
            session.account = session.user_email.clone().unwrap_or_default();
        }
        Some(session)
    }

    /// Removes the cached session of `account`.
    pub async fn delete_session(&self, account: &str) -> Result<()> {
        let account = account.trim();
        if account.is_empty() {
            return Ok(());
        }
        let key = cache_key(account);
        remove(&self.session_path(&key)).await?;
        let last_path = self.dir.join(LAST_FILE);
        if let Ok(Some(last)) = read_json::<Last>(&last_path).await {
            if last.key == key {
                remove(&last_path).await?;
            }
        }
        Ok(())
    }

    /// Removes every cached session.
    pub async fn delete_all_sessions(&self) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::cache(&self.dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::cache(&self.dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let cached = name.starts_with("session-") && name.ends_with(".json");
            if cached || name == LAST_FILE {
                remove(&entry.path()).await?;
            }
        }
        Ok(())
    }

    async fn resume_key(&self, key: &str, account: &str) -> Option<Session> {
        let path = self.session_path(key);
        let record = match read_json::<Record>(&path).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("ignoring the cached session: {e}");
                return None;
            }
        };
        if record.version != VERSION {
            tracing::debug!(version = record.version, "ignoring cached session with unknown version");
            return None;
        }
        let now = OffsetDateTime::now_utc();
        let jar = Arc::new(CookieJar::new());
        let snapshot = record
            .cookies
            .into_iter()
            .filter_map(|(url, cookies)| Url::parse(&url).ok().map(|u| (u, cookies)));
        if jar.restore(snapshot, now) == 0 {
            return None;
        }
        let mut session = Session::new(self.endpoints.clone(), jar, account).ok()?;
        match session.refresh_info().await {
            Ok(()) => {
                tracing::info!(provider_id = ?session.provider_id, "resumed cached web session");
                Some(session)
            }
            Err(e) => {
                tracing::debug!("cached web session rejected: {e}");
                self.diagnostics
                    .line("Cached web session is no longer valid; a new sign-in is required");
                None
            }
        }
    }

    fn session_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("session-{key}.json"))
    }

    async fn create_dir(&self) -> Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(&self.dir)
            .await
            .map_err(|e| Error::cache(&self.dir, e))?;
        set_mode(&self.dir, 0o700).await
    }
}

/// The cache key of `account`: the hex encoded SHA-256 of the trimmed,
/// lowercased account name.
pub fn cache_key(account: &str) -> String {
    hex::encode(Sha256::digest(account.trim().to_lowercase().as_bytes()))
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(&tmp).await.map_err(|e| Error::cache(&tmp, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| Error::cache(&tmp, e))?;
    file.sync_all().await.map_err(|e| Error::cache(&tmp, e))?;
    drop(file);
    set_mode(&tmp, 0o600).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        tracing::warn!(path = %path.display(), "cannot write the session cache: {e}");
        return Err(Error::cache(path, e));
    }
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| Error::cache(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::cache(path, e)),
    };
    serde_json::from_slice::<T>(&contents)
        .map(Some)
        .map_err(Error::cache_format)
}

async fn remove(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::cache(path, e)),
    }
}
