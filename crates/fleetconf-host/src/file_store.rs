//! File-backed snapshot store.
//!
//! Each key is a single file directly under the data directory. Writes go
//! to a temp file in the same directory and are renamed over the target, so
//! a reader sees either the old document or the new one, never a torn file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fleetconf_core::{ConfigError, SnapshotStore};
use tracing::debug;

/// [`SnapshotStore`] keeping one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            ConfigError::local_store(&root.display().to_string(), format!("create dir: {e}"))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its file path.
    ///
    /// A single leading `/` is accepted (`/config.json`); anything that
    /// could escape the root is rejected.
    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let name = key.strip_prefix('/').unwrap_or(key);
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(ConfigError::local_store(key, "invalid storage key"));
        }
        Ok(self.root.join(name))
    }

    fn atomic_write(&self, key: &str, path: &Path, data: &[u8]) -> Result<(), ConfigError> {
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| ConfigError::persist(key, format!("create temp file: {e}")))?;
        temp.write_all(data)
            .map_err(|e| ConfigError::persist(key, format!("write temp file: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| ConfigError::persist(key, format!("sync temp file: {e}")))?;
        temp.persist(path)
            .map_err(|e| ConfigError::persist(key, format!("rename into place: {e}")))?;
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::local_store(key, e.to_string())),
        }
    }

    fn write(&self, key: &str, text: &str) -> Result<(), ConfigError> {
        let path = self.path_for(key).map_err(|e| ConfigError::persist(key, e.to_string()))?;
        self.atomic_write(key, &path, text.as_bytes())?;
        debug!(key, bytes = text.len(), "stored document");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "deleted document");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::local_store(key, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileSnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_read_missing_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.read("config.json").unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        store.write("config.json", r#"{"a":1}"#).unwrap();
        assert_eq!(store.read("config.json").unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.write("config.json", r#"{"a":2}"#).unwrap();
        assert_eq!(store.read("config.json").unwrap().as_deref(), Some(r#"{"a":2}"#));
    }

    #[test]
    fn test_leading_slash_maps_to_same_file() {
        let (_dir, store) = store();
        store.write("/config.json", "{}").unwrap();
        assert_eq!(store.read("config.json").unwrap().as_deref(), Some("{}"));
        assert!(store.root().join("config.json").exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (_dir, store) = store();
        store.write("a.json", "{}").unwrap();
        store.write("a.json", r#"{"x":true}"#).unwrap();

        let names: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        store.write("config-remote.json", "{}").unwrap();
        store.delete("config-remote.json").unwrap();
        store.delete("config-remote.json").unwrap();
        assert_eq!(store.read("config-remote.json").unwrap(), None);
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let (_dir, store) = store();
        for key in ["", "/", "..", "../etc/passwd", "sub/dir.json", "a\\b"] {
            assert!(store.read(key).is_err(), "read {key:?}");
            assert!(
                matches!(store.write(key, "{}"), Err(ConfigError::Persist { .. })),
                "write {key:?}"
            );
            assert!(store.delete(key).is_err(), "delete {key:?}");
        }
    }

    #[test]
    fn test_read_directory_is_error() {
        let (_dir, store) = store();
        fs::create_dir(store.root().join("config.json")).unwrap();
        assert!(matches!(
            store.read("config.json"),
            Err(ConfigError::LocalStore { .. })
        ));
    }
}
