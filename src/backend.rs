//! Key-value persistence backends for the task store.
//!
//! The store keeps a handful of named text records (the task database, the
//! settings, run markers and backup snapshots). [`FileBackend`] maps each key to
//! `<dir>/<key>.json`; [`MemoryBackend`] keeps them in a map.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::error::StoreError;

const LOCK_FILE: &str = ".write.lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Locks older than this were left behind by a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

pub trait KvBackend: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Keep other processes sharing this backend out of a read-modify-write
    /// cycle until the guard drops. Backends private to one process need none.
    fn write_guard(&self) -> Result<WriteGuard, StoreError> {
        Ok(WriteGuard { path: None })
    }
}

/// Cross-process write lock, released on drop.
#[derive(Debug)]
pub struct WriteGuard {
    path: Option<PathBuf>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            if let Err(e) = fs::remove_file(path) {
                warn!("cannot release write lock {}: {e}", path.display());
            }
        }
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf(), lock_timeout: LOCK_TIMEOUT })
    }

    /// How long [`KvBackend::write_guard`] waits for another process.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn evict_stale_lock(path: &Path) {
        let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
            return;
        };
        let Ok(age) = SystemTime::now().duration_since(modified) else {
            return;
        };
        if age > STALE_LOCK_AGE {
            warn!("removing stale write lock {}", path.display());
            let _ = fs::remove_file(path);
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::Unavailable(format!("invalid key {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // Atomic-ish write via temp + rename.
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(value.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_guard(&self) -> Result<WriteGuard, StoreError> {
        let path = self.dir.join(LOCK_FILE);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(WriteGuard { path: Some(path) });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    Self::evict_stale_lock(&path);
                    if started.elapsed() > self.lock_timeout {
                        return Err(StoreError::Unavailable(format!(
                            "timed out waiting for write lock {}",
                            path.display()
                        )));
                    }
                    debug!("write lock busy, waiting");
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backend_round_trips_and_lists_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("settings").unwrap(), None);

        backend.set("settings", "{\"theme\":\"dark\"}").unwrap();
        backend.set("tasks_db", "{}").unwrap();
        assert_eq!(backend.get("settings").unwrap().as_deref(), Some("{\"theme\":\"dark\"}"));
        assert_eq!(backend.keys().unwrap(), vec!["settings".to_string(), "tasks_db".to_string()]);

        backend.remove("settings").unwrap();
        backend.remove("settings").unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["tasks_db".to_string()]);
        assert!(!dir.path().join("tasks_db.json.tmp").exists());
    }

    #[test]
    fn write_guard_excludes_a_second_holder_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileBackend::open(dir.path()).unwrap();
        let second = FileBackend::open(dir.path())
            .unwrap()
            .with_lock_timeout(Duration::from_millis(30));

        let guard = first.write_guard().unwrap();
        assert!(matches!(second.write_guard(), Err(StoreError::Unavailable(_))));
        drop(guard);
        assert!(second.write_guard().is_ok());
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn stale_lock_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join(LOCK_FILE);
        let file = File::create(&lock).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(120)).unwrap();
        drop(file);

        let backend = FileBackend::open(dir.path()).unwrap().with_lock_timeout(Duration::from_millis(200));
        assert!(backend.write_guard().is_ok());
    }

    #[test]
    fn lock_file_is_not_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::open(dir.path()).unwrap();
        backend.set("settings", "{}").unwrap();
        let _guard = backend.write_guard().unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["settings".to_string()]);
    }

    #[test]
    fn file_backend_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.get("../escape").is_err());
    }
}
