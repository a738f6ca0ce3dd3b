//! Persistence backends for the record store.

use super::{Database, StoreError, StoreResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a [`RecordStore`](super::RecordStore) loads and saves its document.
pub trait StoreBackend: Send + Sync + std::fmt::Debug {
    /// Loads the current document, initialising an empty one if none exists yet.
    fn load(&self) -> StoreResult<Database>;

    /// Persists the whole document.
    fn save(&self, db: &Database) -> StoreResult<()>;
}

/// Keeps nothing; every process starts from an empty database.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl StoreBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Database> {
        Ok(Database::default())
    }

    fn save(&self, _db: &Database) -> StoreResult<()> {
        Ok(())
    }
}

/// Stores the whole database as one pretty-printed JSON file.
///
/// Writes go to a sibling temporary file which is then renamed over the target, so readers of
/// the file never observe a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "db.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> StoreResult<Database> {
        if !self.path.exists() {
            let db = Database::default();
            self.save(&db)?;
            tracing::info!("initialised empty store at {}", self.path.display());
            return Ok(db);
        }

        let contents = fs::read_to_string(&self.path).map_err(StoreError::FileRead)?;
        if contents.trim().is_empty() {
            return Ok(Database::default());
        }
        serde_json::from_str(&contents).map_err(StoreError::Deserialization)
    }

    fn save(&self, db: &Database) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
            }
        }

        let json = serde_json::to_string_pretty(db).map_err(StoreError::Serialization)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json).map_err(StoreError::FileWrite)?;
        fs::rename(&temp_path, &self.path).map_err(StoreError::FileWrite)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_initialises_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("data").join("db.json");
        let backend = JsonFileBackend::new(&path);

        let db = backend.load().expect("load should succeed");

        assert_eq!(db, Database::default());
        assert!(path.is_file(), "an empty document should be written");
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"users\""));
        assert!(raw.contains("\"appointments\""));
        assert!(raw.contains("\"prescriptions\""));
    }

    #[test]
    fn test_load_treats_empty_file_as_empty_database() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.json");
        fs::write(&path, "").unwrap();

        let db = JsonFileBackend::new(&path).load().unwrap();
        assert_eq!(db, Database::default());
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileBackend::new(&path)
            .load()
            .expect_err("corrupt file should fail");
        assert!(matches!(err, StoreError::Deserialization(_)));
    }

    #[test]
    fn test_load_accepts_missing_collections() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.json");
        fs::write(&path, r#"{ "users": [] }"#).unwrap();

        let db = JsonFileBackend::new(&path).load().unwrap();
        assert!(db.appointments.is_empty());
        assert!(db.prescriptions.is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("db.json");
        let backend = JsonFileBackend::new(&path);

        backend.save(&Database::default()).unwrap();

        assert!(path.is_file());
        assert!(!backend.temp_path().exists());
    }
}
