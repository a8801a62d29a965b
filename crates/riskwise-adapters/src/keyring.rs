//! Credential storage for the AI provider key
//!
//! The key lives in a single system keychain entry. When the keychain is
//! disabled, or a credentials file already holds a key, a 0600 JSON file in
//! the config directory is used instead so headless runs never prompt.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing::warn;

const KEYRING_SERVICE: &str = "riskwise-credentials";
const KEYRING_USERNAME: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    openrouter_api_key: Option<String>,
}

type KeyringResult<T> = Result<T, String>;

static CREDENTIALS_CACHE: OnceLock<Mutex<Option<StoredCredentials>>> = OnceLock::new();
static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

fn credentials_cache() -> &'static Mutex<Option<StoredCredentials>> {
    CREDENTIALS_CACHE.get_or_init(|| Mutex::new(None))
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name)
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_disabled() -> bool {
    if cfg!(test) || env_flag("RISKWISE_DISABLE_KEYRING") {
        return true;
    }
    // A usable credentials file wins, so CI never hits a keychain prompt
    matches!(read_fallback_credentials(), Ok(creds) if creds.openrouter_api_key.is_some())
}

/// Credential backend name for user-facing messages
pub fn credentials_store_label() -> &'static str {
    if keyring_disabled() {
        "local credentials file"
    } else {
        "system keychain"
    }
}

fn fallback_credentials_path() -> KeyringResult<PathBuf> {
    if let Ok(path) = std::env::var("RISKWISE_CREDENTIALS_FILE") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if cfg!(test) {
        return Ok(std::env::temp_dir().join("riskwise-test-credentials.json"));
    }

    dirs::config_dir()
        .map(|p| p.join("riskwise").join("credentials.json"))
        .ok_or_else(|| "Could not determine credentials file path".to_string())
}

fn read_fallback_credentials() -> KeyringResult<StoredCredentials> {
    let path = fallback_credentials_path()?;
    if !path.exists() {
        return Ok(StoredCredentials::default());
    }
    let json = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read credentials file '{}': {}", path.display(), e))?;
    serde_json::from_str(&json)
        .map_err(|e| format!("Failed to parse credentials file '{}': {}", path.display(), e))
}

fn write_fallback_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    let path = fallback_credentials_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            format!(
                "Failed to create credentials directory '{}': {}",
                parent.display(),
                e
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
        }
    }

    let content = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp_file = fs::File::create(&tmp_path).map_err(|e| {
        format!(
            "Failed to create temp credentials file '{}': {}",
            tmp_path.display(),
            e
        )
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tmp_file.set_permissions(fs::Permissions::from_mode(0o600));
    }
    tmp_file
        .write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write credentials file '{}': {}", tmp_path.display(), e))?;
    fs::rename(&tmp_path, &path)
        .map_err(|e| format!("Failed to finalize credentials file '{}': {}", path.display(), e))
}

/// Log keychain trouble once per process
pub fn warn_keychain_error_once(context: &str, err: &str) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    warn!(
        context,
        error = err,
        "couldn't access system keychain; set RISKWISE_DISABLE_KEYRING=1 or RISKWISE_API_KEY to bypass it"
    );
}

fn read_credentials_uncached() -> KeyringResult<StoredCredentials> {
    if keyring_disabled() {
        return read_fallback_credentials();
    }
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME).map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(json) => {
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse credentials: {}", e))
        }
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.to_string()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    if keyring_disabled() {
        return write_fallback_credentials(creds);
    }
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME).map_err(|e| e.to_string())?;
    let json = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    entry.set_password(&json).map_err(|e| e.to_string())
}

fn read_credentials_cached() -> KeyringResult<StoredCredentials> {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(creds) = guard.as_ref() {
        return Ok(creds.clone());
    }
    let creds = read_credentials_uncached()?;
    *guard = Some(creds.clone());
    Ok(creds)
}

fn update_cache(creds: StoredCredentials) {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(creds);
}

#[cfg(test)]
fn reset_for_tests() {
    let mut guard = match credentials_cache().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
    KEYRING_ERROR_WARNED.store(false, Ordering::Relaxed);
}

// ============================================================================
// Public API
// ============================================================================

/// Stored provider API key, if any
pub fn get_api_key() -> KeyringResult<Option<String>> {
    Ok(read_credentials_cached()?.openrouter_api_key)
}

pub fn set_api_key(key: &str) -> KeyringResult<()> {
    let mut creds = read_credentials_cached().unwrap_or_default();
    creds.openrouter_api_key = Some(key.to_string());
    write_credentials(&creds)?;
    update_cache(creds);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_partial_credentials_omit_missing_key() {
        let json = serde_json::to_string(&StoredCredentials::default()).unwrap();
        assert_eq!(json, "{}");
        let parsed: StoredCredentials = serde_json::from_str("{}").unwrap();
        assert!(parsed.openrouter_api_key.is_none());
    }

    #[test]
    fn test_credentials_store_label_uses_file_backend_in_tests() {
        assert_eq!(credentials_store_label(), "local credentials file");
    }

    #[test]
    fn test_file_backend_round_trip() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("riskwise-keyring-test-{}.json", unique));
        std::env::set_var("RISKWISE_CREDENTIALS_FILE", &path);
        let _ = std::fs::remove_file(&path);
        reset_for_tests();

        set_api_key("sk-or-test-key").unwrap();
        assert_eq!(get_api_key().unwrap(), Some("sk-or-test-key".to_string()));
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("sk-or-test-key"));

        let _ = std::fs::remove_file(&path);
        std::env::remove_var("RISKWISE_CREDENTIALS_FILE");
        reset_for_tests();
    }
}
