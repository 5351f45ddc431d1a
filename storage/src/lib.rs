//! Points Storage Layer - File-Based Snapshots
//!
//! The economy lives in memory; this crate writes point-in-time snapshots
//! to a directory and reads the latest one back on startup. Each snapshot
//! is stored twice: pretty JSON for operators and bincode for fast loads.
//! Files are written to a temporary name and renamed into place, so a crash
//! mid-write never leaves a truncated snapshot behind.

use points_economy::EconomySnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name under which the economy snapshot is stored
pub const ECONOMY_SNAPSHOT: &str = "economy";

const TMP_SUFFIX: &str = "tmp";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Invalid snapshot name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Directory of named snapshots
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Open storage directory, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data_dir = path.as_ref().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
        }
        Ok(Self { data_dir })
    }

    fn paths(&self, name: &str) -> Result<(PathBuf, PathBuf)> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok((
            self.data_dir.join(format!("{}.bin", name)),
            self.data_dir.join(format!("{}.json", name)),
        ))
    }

    /// Save a snapshot (JSON for readability, bincode for speed)
    pub fn save_snapshot<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let (bin_path, json_path) = self.paths(name)?;

        let json = serde_json::to_vec_pretty(data)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let bin = bincode::serialize(data)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        write_atomic(&json_path, &json)?;
        write_atomic(&bin_path, &bin)?;

        debug!(name, bytes = bin.len(), "Snapshot written");
        Ok(())
    }

    /// Load a snapshot (tries bincode first, falls back to JSON)
    pub fn load_snapshot<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<T> {
        let (bin_path, json_path) = self.paths(name)?;

        if bin_path.exists() {
            let data = fs::read(&bin_path)?;
            match bincode::deserialize(&data) {
                Ok(value) => return Ok(value),
                Err(e) if json_path.exists() => {
                    warn!(name, error = %e, "Binary snapshot unreadable, falling back to JSON");
                }
                Err(e) => return Err(StorageError::SerializationError(e.to_string())),
            }
        }

        if json_path.exists() {
            let data = fs::read(&json_path)?;
            return serde_json::from_slice(&data)
                .map_err(|e| StorageError::SerializationError(e.to_string()));
        }

        Err(StorageError::SnapshotNotFound(name.to_string()))
    }

    /// Check if snapshot exists
    pub fn has_snapshot(&self, name: &str) -> bool {
        match self.paths(name) {
            Ok((bin_path, json_path)) => bin_path.exists() || json_path.exists(),
            Err(_) => false,
        }
    }

    /// Names of all stored snapshots, sorted
    pub fn list_snapshots(&self) -> Result<Vec<String>> {
        let mut snapshots = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            let is_snapshot = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("bin") | Some("json")
            );
            if !is_snapshot {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                if !snapshots.iter().any(|s| s == name) {
                    snapshots.push(name.to_string());
                }
            }
        }

        snapshots.sort();
        Ok(snapshots)
    }

    /// Delete a snapshot
    pub fn delete_snapshot(&self, name: &str) -> Result<()> {
        let (bin_path, json_path) = self.paths(name)?;
        if bin_path.exists() {
            fs::remove_file(bin_path)?;
        }
        if json_path.exists() {
            fs::remove_file(json_path)?;
        }
        Ok(())
    }

    /// Persist the whole economy
    pub fn save_economy(&self, snapshot: &EconomySnapshot) -> Result<()> {
        self.save_snapshot(ECONOMY_SNAPSHOT, snapshot)?;
        info!(
            accounts = snapshot.accounts.len(),
            audit_entries = snapshot.audit_log.len(),
            "Economy snapshot saved"
        );
        Ok(())
    }

    /// Load the economy snapshot if one has been saved
    pub fn load_economy(&self) -> Result<Option<EconomySnapshot>> {
        if !self.has_snapshot(ECONOMY_SNAPSHOT) {
            return Ok(None);
        }
        let snapshot: EconomySnapshot = self.load_snapshot(ECONOMY_SNAPSHOT)?;
        info!(
            accounts = snapshot.accounts.len(),
            taken_at = %snapshot.taken_at,
            "Economy snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Get storage directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Write to a sibling temp file, flush, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!(
        "{}.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or_default(),
        TMP_SUFFIX
    ));
    {
        let mut file = fs::File::create(&tmp)?;
        std::io::Write::write_all(&mut file, bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        value: u64,
        name: String,
    }

    fn data(value: u64) -> TestData {
        TestData {
            value,
            name: format!("entry-{}", value),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.save_snapshot("test", &data(12345)).unwrap();
        let loaded: TestData = storage.load_snapshot("test").unwrap();
        assert_eq!(loaded, data(12345));
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.save_snapshot("test", &data(1)).unwrap();
        storage.save_snapshot("test", &data(2)).unwrap();

        let loaded: TestData = storage.load_snapshot("test").unwrap();
        assert_eq!(loaded.value, 2);
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_falls_back_to_json() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.save_snapshot("test", &data(7)).unwrap();
        fs::write(dir.path().join("test.bin"), b"\x01").unwrap();

        let loaded: TestData = storage.load_snapshot("test").unwrap();
        assert_eq!(loaded, data(7));
    }

    #[test]
    fn test_missing_and_invalid_names() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert!(!storage.has_snapshot("test"));
        assert!(matches!(
            storage.load_snapshot::<TestData>("test"),
            Err(StorageError::SnapshotNotFound(_))
        ));
        assert!(matches!(
            storage.save_snapshot("../escape", &data(1)),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.save_snapshot("snapshot2", &data(2)).unwrap();
        storage.save_snapshot("snapshot1", &data(1)).unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();

        assert_eq!(
            storage.list_snapshots().unwrap(),
            vec!["snapshot1".to_string(), "snapshot2".to_string()]
        );

        storage.delete_snapshot("snapshot1").unwrap();
        assert!(!storage.has_snapshot("snapshot1"));
        assert_eq!(storage.list_snapshots().unwrap().len(), 1);
    }
}
