//! Per-provider API keys, persisted in a JSON config file.
//!
//! The file holds secrets, so it is written with owner-only permissions
//! (0600) on Unix.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use bn_domain::error::{Error, Result};

pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "anthropic", "google"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    api_keys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub provider: String,
    pub configured: bool,
    pub masked_key: Option<String>,
}

/// File-backed key store. Reads go to disk each time so edits made by
/// other processes are picked up; writes are serialized in-process.
pub struct ApiKeyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ApiKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, provider: &str) -> Option<String> {
        self.read_file().api_keys.get(provider).cloned()
    }

    pub fn set(&self, provider: &str, api_key: &str) -> Result<()> {
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            return Err(Error::BadRequest(format!(
                "unsupported provider: {provider}"
            )));
        }
        let _guard = self.write_lock.lock();
        let mut file = self.read_file();
        file.api_keys
            .insert(provider.to_string(), api_key.to_string());
        self.write_file(&file)
    }

    pub fn delete(&self, provider: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = self.read_file();
        file.api_keys.remove(provider);
        self.write_file(&file)
    }

    /// Status of every supported provider, keys masked to the last four
    /// characters.
    pub fn list(&self) -> Vec<KeyStatus> {
        let file = self.read_file();
        SUPPORTED_PROVIDERS
            .iter()
            .map(|&provider| {
                let key = file.api_keys.get(provider);
                KeyStatus {
                    provider: provider.to_string(),
                    configured: key.is_some_and(|k| !k.is_empty()),
                    masked_key: key.map(|k| mask_key(k)),
                }
            })
            .collect()
    }

    fn read_file(&self) -> KeyFile {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => KeyFile::default(),
        }
    }

    fn write_file(&self, file: &KeyFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Mask all but the last four characters.
fn mask_key(key: &str) -> String {
    if key.len() <= 4 {
        return "****".to_string();
    }
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{}{}", "*".repeat(key.chars().count() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (ApiKeyStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (ApiKeyStore::new(dir.path().join("config.json")), dir)
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let (store, _dir) = temp_store();
        assert!(store.get("openai").is_none());

        store.set("openai", "sk-test-1234").unwrap();
        assert_eq!(store.get("openai").as_deref(), Some("sk-test-1234"));

        store.delete("openai").unwrap();
        assert!(store.get("openai").is_none());
    }

    #[test]
    fn unsupported_provider_rejected() {
        let (store, _dir) = temp_store();
        assert!(matches!(
            store.set("bedrock", "key"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn list_masks_keys() {
        let (store, _dir) = temp_store();
        store.set("anthropic", "sk-ant-abcdef").unwrap();

        let statuses = store.list();
        assert_eq!(statuses.len(), SUPPORTED_PROVIDERS.len());
        let anthropic = statuses
            .iter()
            .find(|s| s.provider == "anthropic")
            .unwrap();
        assert!(anthropic.configured);
        let masked = anthropic.masked_key.as_deref().unwrap();
        assert!(masked.ends_with("cdef"));
        assert!(!masked.contains("sk-ant"));

        let google = statuses.iter().find(|s| s.provider == "google").unwrap();
        assert!(!google.configured);
        assert!(google.masked_key.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (store, _dir) = temp_store();
        store.set("openai", "secret").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn short_keys_fully_masked() {
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("abcdefgh"), "****efgh");
    }
}
