use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShopfloorError};

pub const ACCESS_KEY_ENV: &str = "SHOPFLOOR_ACCESS_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.appsheet.com/api/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Appsheet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSheetSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key: String,
}

impl Default for AppSheetSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            access_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub appsheet: AppSheetSettings,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_import_batch_size")]
    pub import_batch_size: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_import_batch_size() -> usize {
    25
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            backend: Backend::default(),
            appsheet: AppSheetSettings::default(),
            page_size: default_page_size(),
            import_batch_size: default_import_batch_size(),
        }
    }
}

impl Settings {
    /// Access key from the environment first, then the settings file.
    pub fn access_key(&self) -> String {
        std::env::var(ACCESS_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| self.appsheet.access_key.clone())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("shopfloor")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("shopfloor")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ShopfloorError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user_name: "An".to_string(),
            backend: Backend::Appsheet,
            appsheet: AppSheetSettings {
                app_id: "app-1".to_string(),
                ..Default::default()
            },
            page_size: 20,
            import_batch_size: 25,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.user_name, "An");
        assert_eq!(loaded.backend, Backend::Appsheet);
        assert_eq!(loaded.appsheet.app_id, "app-1");
        assert_eq!(loaded.page_size, 20);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.user_name.is_empty());
        assert_eq!(s.backend, Backend::Local);
        assert_eq!(s.page_size, 10);
        assert_eq!(s.import_batch_size, 25);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "user_name": "Bình"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.backend, Backend::Local);
        assert_eq!(s.import_batch_size, 25);
        assert_eq!(s.appsheet.base_url, "https://api.appsheet.com/api/v2");
        assert_eq!(s.user_name, "Bình");
    }

    #[test]
    fn test_access_key_not_written_when_empty() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(!json.contains("access_key"));
    }
}
