//! Workspace key-value storage
//!
//! `JsonFileStore` keeps every key in one JSON object under
//! `<workspace>/.riskwise/store.json`, guarded by an advisory file lock so
//! two processes never interleave a read-modify-write. `MemoryStore` backs
//! tests and one-off runs.

use anyhow::Context;
use fs2::FileExt;
use riskwise_core::Storage;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

pub const WORKSPACE_DIR: &str = ".riskwise";
const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = ".lock";
const LOCK_TIMEOUT_SECS: u64 = 5;
const LOCK_RETRY_MS: u64 = 25;

type Entries = BTreeMap<String, String>;

pub struct JsonFileStore {
    dir: PathBuf,
}

struct StoreLock {
    file: fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl JsonFileStore {
    /// Store rooted at `<workspace_root>/.riskwise`
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            dir: workspace_root.join(WORKSPACE_DIR),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn lock(&self, exclusive: bool) -> anyhow::Result<StoreLock> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;

        let start = Instant::now();
        loop {
            let result = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match result {
                Ok(()) => return Ok(StoreLock { file }),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= Duration::from_secs(LOCK_TIMEOUT_SECS) {
                        return Err(anyhow::anyhow!(
                            "Timed out waiting for store lock ({}s)",
                            LOCK_TIMEOUT_SECS
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(LOCK_RETRY_MS));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_entries(&self) -> anyhow::Result<Entries> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _lock = self.lock(false)?;
        Ok(self.read_entries()?.remove(key))
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _lock = self.lock(true)?;
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&entries)?;
        write_atomic(&self.path(), &content)
    }
}

impl Storage for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "failed to read workspace store");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.store(key, value).map_err(|e| format!("{:#}", e))
    }
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
