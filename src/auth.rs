//! Stored Notion credentials.
//!
//! The credential bundle is persisted as a small JSON file next to the note
//! store. Loading applies the expiry check eagerly: an expired bundle is
//! treated exactly like a missing one, so every consumer sees a single
//! "authenticated or not" answer.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{Config, Result};

const AUTH_FILE: &str = "notion_auth.json";

/// A Notion credential bundle, either from an OAuth exchange or an
/// integration token pasted at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotionAuth {
    /// Bearer token sent on every API call
    pub access_token: String,

    /// Workspace name, display only
    #[serde(default)]
    pub workspace_name: Option<String>,

    /// Workspace id as reported by the OAuth exchange, when known
    #[serde(default)]
    pub workspace_id: Option<String>,

    /// Absolute expiry instant; integration tokens have none
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotionAuth {
    pub fn new(access_token: String, workspace_name: Option<String>) -> Self {
        Self {
            access_token,
            workspace_name,
            workspace_id: None,
            expires_at: None,
        }
    }

    /// True when the bundle carries an expiry instant that has passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now(),
            None => false,
        }
    }
}

/// Persists and retrieves the credential bundle.
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.data_dir.join(AUTH_FILE),
        }
    }

    /// Loads the stored bundle. Absent, unreadable, malformed and expired
    /// bundles all yield None; the expired case additionally discards the
    /// file so a later save starts clean.
    pub fn load(&self) -> Option<NotionAuth> {
        if !self.path.exists() {
            return None;
        }

        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read auth bundle {}: {}", self.path.display(), e);
                return None;
            }
        };

        let auth: NotionAuth = match serde_json::from_str(&raw) {
            Ok(auth) => auth,
            Err(e) => {
                warn!("Auth bundle {} is malformed: {}", self.path.display(), e);
                return None;
            }
        };

        if auth.is_expired() {
            warn!("Stored Notion credentials have expired; please log in again");
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to discard expired auth bundle: {}", e);
            }
            return None;
        }

        Some(auth)
    }

    /// Writes the bundle to disk.
    pub fn save(&self, auth: &NotionAuth) -> Result<()> {
        let json = serde_json::to_string_pretty(auth)?;
        fs::write(&self.path, json)?;
        info!(
            "Stored Notion credentials for workspace {}",
            auth.workspace_name.as_deref().unwrap_or("(unnamed)")
        );
        Ok(())
    }

    /// Removes the stored bundle. Removing a bundle that does not exist is
    /// not an error.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!("Discarded stored Notion credentials");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store(dir: &std::path::Path) -> AuthStore {
        let config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        AuthStore::new(&config)
    }

    #[test]
    fn round_trips_a_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let auth = NotionAuth::new("secret-token".into(), Some("Acme".into()));
        store.save(&auth).unwrap();
        assert_eq!(store.load(), Some(auth));
    }

    #[test]
    fn missing_bundle_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).load().is_none());
    }

    #[test]
    fn expired_bundle_is_discarded_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut auth = NotionAuth::new("stale".into(), None);
        auth.expires_at = Some(Utc::now() - Duration::hours(1));
        store.save(&auth).unwrap();

        assert!(store.load().is_none());
        // the file itself is gone too
        assert!(store.load().is_none());
    }

    #[test]
    fn future_expiry_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut auth = NotionAuth::new("fresh".into(), None);
        auth.expires_at = Some(Utc::now() + Duration::hours(1));
        store.save(&auth).unwrap();
        assert!(store.load().is_some());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&NotionAuth::new("t".into(), None)).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
