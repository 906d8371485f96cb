// SPDX-License-Identifier: MIT
//! Secret storage for AI auth credentials.
//!
//! Each secret is one file under `{data_dir}/secrets/` with user-only
//! permissions (mode 0600 on Unix), same scheme as the daemon auth token.
//! Retired key names from earlier releases are migrated or deleted once at
//! startup.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current secret keys.
pub const ACCESS_TOKEN_KEY: &str = "ai.access_token";
pub const API_KEY_KEY: &str = "ai.api_key";
pub const ACCOUNT_KEY: &str = "ai.account";

/// Legacy keys: `(old_name, Some(new_name))` migrates the value if the new
/// key is absent; `(old_name, None)` deletes the stale value outright.
const LEGACY_KEYS: &[(&str, Option<&str>)] = &[
    ("ai_auth_token", Some(ACCESS_TOKEN_KEY)),
    ("ai_refresh_token", None),
];

pub struct SecretStore {
    dir: PathBuf,
}

impl SecretStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("secrets"),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read a secret; `None` if absent or empty.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = std::fs::read_to_string(self.key_path(key)).ok()?;
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Write a secret with user-only permissions.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        std::fs::write(&path, value)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Delete a secret.  Deleting an absent key is a no-op.
    pub fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// One-time startup pass over retired key names: values still worth
    /// keeping move to their current key, everything else is deleted.
    /// Failures are logged and skipped — migration is best-effort.
    pub fn migrate_legacy_keys(&self) {
        for (old, replacement) in LEGACY_KEYS {
            let Some(value) = self.get(old) else { continue };
            match replacement {
                Some(new) if self.get(new).is_none() => {
                    if let Err(e) = self.set(new, &value) {
                        warn!(key = old, err = %e, "legacy secret migration failed");
                        continue;
                    }
                    info!(
                        from = old,
                        to = new,
                        fingerprint = %fingerprint(&value),
                        "legacy secret migrated"
                    );
                }
                _ => {
                    info!(key = old, "stale legacy secret deleted");
                }
            }
            if let Err(e) = self.delete(old) {
                warn!(key = old, err = %e, "legacy secret deletion failed");
            }
        }
    }
}

/// Short SHA-256 fingerprint for logging a secret without exposing it.
fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::new(dir.path());
        assert!(store.get(API_KEY_KEY).is_none());
        store.set(API_KEY_KEY, "sk-test").unwrap();
        assert_eq!(store.get(API_KEY_KEY).as_deref(), Some("sk-test"));
        store.delete(API_KEY_KEY).unwrap();
        assert!(store.get(API_KEY_KEY).is_none());
        // Double-delete is a no-op.
        store.delete(API_KEY_KEY).unwrap();
    }

    #[test]
    fn test_migrate_moves_token_and_deletes_stale() {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::new(dir.path());
        store.set("ai_auth_token", "tok-123").unwrap();
        store.set("ai_refresh_token", "ref-456").unwrap();

        store.migrate_legacy_keys();

        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("tok-123"));
        assert!(store.get("ai_auth_token").is_none());
        assert!(store.get("ai_refresh_token").is_none());
    }

    #[test]
    fn test_migrate_does_not_clobber_current_key() {
        let dir = TempDir::new().unwrap();
        let store = SecretStore::new(dir.path());
        store.set(ACCESS_TOKEN_KEY, "current").unwrap();
        store.set("ai_auth_token", "old").unwrap();

        store.migrate_legacy_keys();

        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("current"));
        assert!(store.get("ai_auth_token").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = SecretStore::new(dir.path());
        store.set(API_KEY_KEY, "sk-test").unwrap();
        let mode = std::fs::metadata(dir.path().join("secrets").join(API_KEY_KEY))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
