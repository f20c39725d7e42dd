use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Persisted user settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Settings {
    /// Configured backend URL without a trailing slash, or the default.
    pub fn resolved_backend_url(&self) -> String {
        self.backend_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Shared key-value settings store.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        Ok(Self::new(settings))
    }

    pub fn get(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Merge the present fields of `update` into the stored settings.
    pub fn save(&self, update: Settings) {
        let mut settings = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if update.backend_url.is_some() {
            settings.backend_url = update.backend_url;
        }
        if update.api_key.is_some() {
            settings.api_key = update.api_key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_backend_url() {
        assert_eq!(Settings::default().resolved_backend_url(), DEFAULT_BACKEND_URL);

        let blank = Settings {
            backend_url: Some("   ".into()),
            api_key: None,
        };
        assert_eq!(blank.resolved_backend_url(), DEFAULT_BACKEND_URL);

        let custom = Settings {
            backend_url: Some(" https://buddy.example.com/ ".into()),
            api_key: None,
        };
        assert_eq!(custom.resolved_backend_url(), "https://buddy.example.com");
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let settings = Settings {
            backend_url: None,
            api_key: Some(" ".into()),
        };
        assert_eq!(settings.api_key(), None);
    }

    #[test]
    fn test_save_merges_present_fields() {
        let store = SettingsStore::new(Settings {
            backend_url: Some("https://a".into()),
            api_key: Some("k1".into()),
        });

        store.save(Settings {
            backend_url: None,
            api_key: Some("k2".into()),
        });

        let settings = store.get();
        assert_eq!(settings.backend_url.as_deref(), Some("https://a"));
        assert_eq!(settings.api_key.as_deref(), Some("k2"));
    }

    #[test]
    fn test_load_missing_and_present_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = SettingsStore::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.get(), Settings::default());

        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "backendUrl = \"https://buddy\"\napiKey = \"secret\"\n").unwrap();
        let loaded = SettingsStore::load(&path).unwrap();
        assert_eq!(loaded.get().resolved_backend_url(), "https://buddy");
        assert_eq!(loaded.get().api_key(), Some("secret"));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "backendUrl = [").unwrap();

        assert!(matches!(SettingsStore::load(&path), Err(ConfigError::Parse(_))));
    }
}
