/*
 *  store.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *  Credential store - flat JSON key/value file holding the logged in user and
 *  cached certificates, with change notifications
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use thiserror::Error;
use tokio::sync::broadcast;

/// The one authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires: DateTime<Utc>,
    #[serde(rename = "scopes")]
    pub scope: String,
}

/// Cached self-signed certificate for one hostname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub common_name: String,
    pub cert: String,
    pub key: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires: DateTime<Utc>,
}

/// Delivered on every set/delete of the user session.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub new: Option<UserSession>,
    pub old: Option<UserSession>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Dump {
    #[serde(rename = "spotify-user", default, skip_serializing_if = "Option::is_none")]
    spotify_user: Option<UserSession>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    certificates: Vec<CertificateRecord>,
    // keep whatever else lives in the file
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

pub struct CredentialStore {
    file_path: PathBuf,
    dump: Mutex<Dump>,
    changes: broadcast::Sender<StoreChange>,
}

impl CredentialStore {
    /// Opens the store at `file_path`; a missing file is an empty store.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file_path = file_path.into();
        let dump = Self::load_dump_from_file(&file_path)?;
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            file_path,
            dump: Mutex::new(dump),
            changes,
        })
    }

    fn load_dump_from_file(file_path: &Path) -> Result<Dump, StoreError> {
        match fs::read_to_string(file_path) {
            Ok(content) if content.trim().is_empty() => Ok(Dump::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", file_path.display());
                Ok(Dump::default())
            }
            Err(source) => Err(StoreError::Io { path: file_path.to_path_buf(), source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn lock(&self) -> MutexGuard<'_, Dump> {
        self.dump.lock().unwrap_or_else(|poisoned| {
            warn!("Credential store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Writes to a sibling temp file then renames over the store.
    fn save_dump(&self, dump: &Dump) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.file_path.clone(), source };

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json_string = serde_json::to_string_pretty(dump)?;
        let tmp = self.file_path.with_extension("json.tmp");
        fs::write(&tmp, json_string.as_bytes()).map_err(io_err)?;
        fs::rename(&tmp, &self.file_path).map_err(io_err)?;
        Ok(())
    }

    fn notify(&self, change: StoreChange) {
        // no receivers is fine
        let _ = self.changes.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn get(&self) -> Option<UserSession> {
        self.lock().spotify_user.clone()
    }

    pub fn has(&self) -> bool {
        self.lock().spotify_user.is_some()
    }

    pub fn set(&self, session: UserSession) -> Result<(), StoreError> {
        let old = {
            let mut dump = self.lock();
            let old = dump.spotify_user.replace(session.clone());
            if let Err(e) = self.save_dump(&dump) {
                dump.spotify_user = old;
                return Err(e);
            }
            old
        };
        self.notify(StoreChange { new: Some(session), old });
        Ok(())
    }

    pub fn delete(&self) -> Result<(), StoreError> {
        let old = {
            let mut dump = self.lock();
            let old = dump.spotify_user.take();
            if let Err(e) = self.save_dump(&dump) {
                dump.spotify_user = old;
                return Err(e);
            }
            old
        };
        self.notify(StoreChange { new: None, old });
        Ok(())
    }

    /// Swaps in a refreshed access token for user `id` in one read-modify-write.
    /// Identity and refresh token are left alone. Returns the updated session,
    /// or `None` when `id` is no longer the stored user.
    pub fn update_access_token(
        &self,
        id: &str,
        access_token: String,
        expires: DateTime<Utc>,
    ) -> Result<Option<UserSession>, StoreError> {
        let (new, old) = {
            let mut dump = self.lock();
            let Some(current) = dump.spotify_user.clone() else {
                return Ok(None);
            };
            if current.id != id {
                return Ok(None);
            }
            let updated = UserSession { access_token, expires, ..current.clone() };
            dump.spotify_user = Some(updated.clone());
            if let Err(e) = self.save_dump(&dump) {
                dump.spotify_user = Some(current);
                return Err(e);
            }
            (updated, current)
        };
        self.notify(StoreChange { new: Some(new.clone()), old: Some(old) });
        Ok(Some(new))
    }

    /// Unexpired certificate for `common_name`, if one is cached.
    pub fn certificate(&self, common_name: &str, now: DateTime<Utc>) -> Option<CertificateRecord> {
        self.lock()
            .certificates
            .iter()
            .find(|c| c.common_name == common_name && c.expires > now)
            .cloned()
    }

    /// Caches `record`, replacing any previous one for the same name.
    pub fn put_certificate(&self, record: CertificateRecord) -> Result<(), StoreError> {
        let mut dump = self.lock();
        let previous = dump.certificates.clone();
        dump.certificates.retain(|c| c.common_name != record.common_name);
        dump.certificates.push(record);
        if let Err(e) = self.save_dump(&dump) {
            dump.certificates = previous;
            return Err(e);
        }
        Ok(())
    }
}
