use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::marks::Snapshot;

/// Durable home of the last observed snapshot. Holds exactly one snapshot.
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Snapshot, StoreError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotInitialized)
            }
            Err(err) => return Err(self.io_error(err)),
        };
        if data.trim().is_empty() {
            return Err(StoreError::NotInitialized);
        }
        serde_json::from_str(&data).map_err(|err| {
            warn!(
                "state file {} is unreadable ({err}), treating as first run",
                self.path.display()
            );
            StoreError::NotInitialized
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|err| self.io_error(err))?;

        let mut encoded = serde_json::to_string_pretty(snapshot)?;
        encoded.push('\n');

        let mut tmp = NamedTempFile::new_in(&parent).map_err(|err| self.io_error(err))?;
        tmp.write_all(encoded.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|err| self.io_error(err))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        debug!(
            "wrote snapshot with {} tests to {}",
            snapshot.test_count,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use super::{JsonFileStore, StateStore};
    use crate::error::StoreError;
    use crate::marks::{Grade, Snapshot};

    fn sample() -> Snapshot {
        let mut math = BTreeMap::new();
        math.insert("Midterm".to_string(), Grade::Numeric(15.5));
        math.insert("Oral".to_string(), Grade::from("absent"));
        let mut marks = BTreeMap::new();
        marks.insert("Mathématiques".to_string(), math);
        Snapshot::new(7, marks)
    }

    #[test]
    fn missing_file_is_not_initialized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("marks.json"));
        assert!(matches!(store.load(), Err(StoreError::NotInitialized)));
    }

    #[test]
    fn empty_or_corrupt_file_is_not_initialized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marks.json");
        let store = JsonFileStore::open(&path);

        fs::write(&path, "  \n").expect("write empty");
        assert!(matches!(store.load(), Err(StoreError::NotInitialized)));

        fs::write(&path, "{\"tests\": 3, \"marks\": {").expect("write truncated");
        assert!(matches!(store.load(), Err(StoreError::NotInitialized)));
    }

    #[test]
    fn save_then_load_returns_same_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("nested/state/marks.json"));
        let snapshot = sample();
        store.save(&snapshot).expect("save");
        assert_eq!(store.load().expect("load"), snapshot);
    }

    #[test]
    fn resaving_loaded_snapshot_leaves_bytes_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marks.json");
        let store = JsonFileStore::open(&path);
        store.save(&sample()).expect("save");
        let before = fs::read(&path).expect("read");

        let loaded = store.load().expect("load");
        store.save(&loaded).expect("resave");
        assert_eq!(fs::read(&path).expect("read again"), before);
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path().join("marks.json"));
        store.save(&sample()).expect("first save");
        let replacement = Snapshot::new(9, BTreeMap::new());
        store.save(&replacement).expect("second save");
        assert_eq!(store.load().expect("load"), replacement);

        let leftovers = fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(leftovers, 1);
    }
}
