//! TOML configuration.
//!
//! ```toml
//! [api]
//! base_url = "http://127.0.0.1:5000"
//! # timeout_secs = 60      # unset: requests never time out
//!
//! [chat]
//! use_knowledge_search = true
//! use_web_search = false
//!
//! [collection]
//! per_page = 5
//!
//! [upload]
//! max_upload_bytes = 20971520
//! ```
//!
//! Every section is optional. `KBCHAT_BASE_URL` in the environment
//! overrides `api.base_url`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding `api.base_url`.
pub const BASE_URL_ENV: &str = "KBCHAT_BASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_true")]
    pub use_knowledge_search: bool,
    #[serde(default)]
    pub use_web_search: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            use_knowledge_search: true,
            use_web_search: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

fn default_per_page() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    20 * 1024 * 1024
}

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    finish(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        finish(Config::default())
    }
}

fn finish(mut config: Config) -> Result<Config> {
    override_base_url(&mut config, std::env::var(BASE_URL_ENV).ok().as_deref());
    validate(&config)?;
    Ok(config)
}

/// Blank values leave `api.base_url` alone.
fn override_base_url(config: &mut Config, value: Option<&str>) {
    match value.map(str::trim) {
        Some(url) if !url.is_empty() => {
            tracing::debug!(base_url = url, "base URL overridden from {}", BASE_URL_ENV);
            config.api.base_url = url.to_string();
        }
        _ => {}
    }
}

fn validate(config: &Config) -> Result<()> {
    let base = config.api.base_url.as_str();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        anyhow::bail!("api.base_url must start with http:// or https:// (got '{}')", base);
    }
    if config.api.timeout_secs == Some(0) {
        anyhow::bail!("api.timeout_secs must be > 0 when set");
    }
    if config.collection.per_page == 0 {
        anyhow::bail!("collection.per_page must be >= 1");
    }
    if config.upload.max_upload_bytes == 0 {
        anyhow::bail!("upload.max_upload_bytes must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialises tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
        assert!(config.api.timeout_secs.is_none());
        assert!(config.chat.use_knowledge_search);
        assert!(!config.chat.use_web_search);
        assert_eq!(config.collection.per_page, 5);
        assert_eq!(config.upload.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
[api]
base_url = "https://kb.example.com"
timeout_secs = 30

[chat]
use_web_search = true
"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://kb.example.com");
        assert_eq!(config.api.timeout_secs, Some(30));
        assert!(config.chat.use_knowledge_search);
        assert!(config.chat.use_web_search);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api.base_url = "ftp://x".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.collection.per_page = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.api.timeout_secs = Some(0);
        assert!(validate(&config).is_err());

        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kbchat.toml");
        std::fs::write(&path, "[collection]\nper_page = 10\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.collection.per_page, 10);
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kbchat.toml");
        std::fs::write(&path, "[collection\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_base_url_override_is_trimmed() {
        let mut config = Config::default();
        override_base_url(&mut config, Some("  https://kb.internal:8443 \n"));
        assert_eq!(config.api.base_url, "https://kb.internal:8443");
    }

    #[test]
    fn test_blank_base_url_override_is_ignored() {
        let mut config = Config::default();
        override_base_url(&mut config, Some("   "));
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
        override_base_url(&mut config, None);
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var(BASE_URL_ENV);

        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.collection.per_page, 5);
        assert!(config.chat.use_knowledge_search);
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kbchat.toml");
        std::fs::write(&path, "[api]\nbase_url = \"http://from-file:5000\"\n").unwrap();

        std::env::set_var(BASE_URL_ENV, " https://from-env.example.com ");
        let from_file = load_config(&path);
        let from_default = load_config_or_default(&tmp.path().join("absent.toml"));
        std::env::set_var(BASE_URL_ENV, "  ");
        let blank = load_config(&path);
        std::env::remove_var(BASE_URL_ENV);

        assert_eq!(from_file.unwrap().api.base_url, "https://from-env.example.com");
        assert_eq!(from_default.unwrap().api.base_url, "https://from-env.example.com");
        assert_eq!(blank.unwrap().api.base_url, "http://from-file:5000");
    }
}
