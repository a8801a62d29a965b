//! Configuration management for riskwise
//!
//! Stores settings in ~/.config/riskwise/config.json

use crate::keyring;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 600;
pub const DEFAULT_TEMPERATURE: f32 = 0.4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MONTHLY_CALL_LIMIT: u32 = 100;
pub const DEFAULT_INDUSTRY: &str = "general";
pub const DEFAULT_REGISTER_TYPE: &str = "enterprise";

const API_KEY_ENV_VARS: [&str; 2] = ["RISKWISE_API_KEY", "OPENROUTER_API_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub monthly_call_limit: u32,
    pub industry: String,
    pub register_type: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            monthly_call_limit: DEFAULT_MONTHLY_CALL_LIMIT,
            industry: DEFAULT_INDUSTRY.to_string(),
            register_type: DEFAULT_REGISTER_TYPE.to_string(),
        }
    }
}

impl Config {
    fn sanitize(&mut self) {
        if self.model.trim().is_empty() {
            self.model = DEFAULT_MODEL.to_string();
        }
        if !is_valid_base_url(&self.base_url) {
            warn!(base_url = %self.base_url, "ignoring invalid base_url in config");
            self.base_url = DEFAULT_BASE_URL.to_string();
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.max_tokens = self.max_tokens.clamp(64, 4096);
        if !self.temperature.is_finite() {
            self.temperature = DEFAULT_TEMPERATURE;
        }
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.timeout_secs = self.timeout_secs.clamp(5, 300);
        if self.industry.trim().is_empty() {
            self.industry = DEFAULT_INDUSTRY.to_string();
        }
        if self.register_type.trim().is_empty() {
            self.register_type = DEFAULT_REGISTER_TYPE.to_string();
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("riskwise"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path. A corrupt file is moved aside and
    /// defaults are returned.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Config>(&content) {
            Ok(mut config) => {
                config.sanitize();
                config
            }
            Err(err) => {
                preserve_corrupt_config(path, &content);
                warn!(
                    path = %path.display(),
                    error = %err,
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let mut sanitized = self.clone();
        sanitized.sanitize();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    warn!(error = %e, "failed to set config directory permissions");
                }
            }
        }

        let content = serde_json::to_string_pretty(&sanitized)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Provider API key (credential store first, environment fallback)
    pub fn get_api_key(&self) -> Option<String> {
        match keyring::get_api_key() {
            Ok(Some(key)) => return Some(key),
            Ok(None) => {}
            Err(err) => {
                keyring::warn_keychain_error_once("API key", &err);
            }
        }
        api_key_from_env()
    }

    /// Store the API key and read it back
    pub fn set_api_key(&self, key: &str) -> Result<(), String> {
        keyring::set_api_key(key).map_err(|e| {
            format!(
                "Failed to store API key in {}: {}. \
                 You can set the RISKWISE_API_KEY environment variable instead.",
                keyring::credentials_store_label(),
                e
            )
        })?;

        match keyring::get_api_key() {
            Ok(Some(stored_key)) if stored_key == key => self.save(),
            Ok(Some(_)) => Err(format!(
                "API key verification failed: stored key doesn't match in {}. \
                 You can set the RISKWISE_API_KEY environment variable instead.",
                keyring::credentials_store_label()
            )),
            Ok(None) => Err(format!(
                "API key verification failed: key was not persisted to {}. \
                 You can set the RISKWISE_API_KEY environment variable instead.",
                keyring::credentials_store_label()
            )),
            Err(read_err) => Err(format!(
                "API key verification failed: couldn't read back from {} ({}). \
                 You can set the RISKWISE_API_KEY environment variable instead.",
                keyring::credentials_store_label(),
                read_err
            )),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// OpenRouter keys start with `sk-or-`
    pub fn validate_api_key_format(key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && key.starts_with("sk-or-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/riskwise/config.json".to_string())
    }
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

fn is_valid_base_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Interactive prompt to set up API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  RISKWISE SETUP                                         │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  riskwise uses OpenRouter for AI-assisted field suggestions.");
    println!("  Without a key, suggestions come from built-in industry templates.");
    println!();
    println!("  Steps:");
    println!("    1) Create a key at https://openrouter.ai/keys");
    println!("    2) Paste the key below and press Enter");
    println!();
    println!("  Data use notice: riskwise sends the record you are editing (titles,");
    println!("  descriptions, scores and linked item names) to the configured model.");
    println!();
    println!(
        "  We'll store it in your {}.",
        keyring::credentials_store_label()
    );
    println!("  You can update it later with `riskwise setup`.");
    println!("  Prefer env vars? Set RISKWISE_API_KEY and rerun.");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like an OpenRouter key (usually starts with sk-or-)");
        println!("     Saving anyway...");
    }

    let config = Config::load();
    config.set_api_key(&key)?;

    println!();
    println!("  + API key saved. Settings live in {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, "failed to set temp config file permissions");
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens, 600);
        assert_eq!(config.monthly_call_limit, 100);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_partial_file_fills_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"industry":"healthcare"}"#).unwrap();
        assert_eq!(parsed.industry, "healthcare");
        assert_eq!(parsed.model, DEFAULT_MODEL);
        assert_eq!(parsed.register_type, DEFAULT_REGISTER_TYPE);
    }

    #[test]
    fn test_sanitize_rejects_bad_base_url_and_clamps() {
        let mut config = Config {
            base_url: "ftp://example.com".to_string(),
            max_tokens: 10,
            temperature: 9.0,
            timeout_secs: 0,
            industry: "  ".to_string(),
            ..Config::default()
        };
        config.sanitize();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.industry, DEFAULT_INDUSTRY);
    }

    #[test]
    fn test_sanitize_trims_trailing_slash() {
        let mut config = Config {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Config::default()
        };
        config.sanitize();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riskwise").join("config.json");
        let config = Config {
            industry: "financial-services".to_string(),
            monthly_call_limit: 250,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_corrupt_config_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(!path.exists());
        let backup = fs::read_to_string(dir.path().join("config.json.corrupt")).unwrap();
        assert_eq!(backup, "{not json");
    }

    #[test]
    fn test_missing_config_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Config::load_from(&dir.path().join("absent.json")),
            Config::default()
        );
    }

    #[test]
    fn test_validate_api_key_format() {
        assert!(Config::validate_api_key_format("sk-or-v1-abc"));
        assert!(!Config::validate_api_key_format("gsk_abc"));
        assert!(!Config::validate_api_key_format("   "));
    }
}
