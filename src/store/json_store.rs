//! JSON file report store - one pretty-printed file per record
//!
//! Layout: `<root>/<protocol_id>/<calculated_at_ms>.json`. Files are written to
//! a temp file in the same directory and hard-linked into place, so a reader
//! never sees a partial record and an existing record is never replaced.

use super::{ReportStore, StoreError};
use crate::scoring::ScoreRecord;
use async_trait::async_trait;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub struct JsonReportStore {
    root: PathBuf,
}

impl JsonReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        log::info!("📝 Writing score reports to: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn protocol_dir(&self, protocol_id: &str) -> PathBuf {
        self.root.join(protocol_id)
    }

    /// Record timestamps (ms) stored for a protocol, oldest first
    fn stored_keys(&self, protocol_id: &str) -> Result<Vec<i64>, StoreError> {
        let dir = self.protocol_dir(protocol_id);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys: Vec<i64> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse().ok())
            })
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn read_record(&self, protocol_id: &str, key: i64) -> Result<ScoreRecord, StoreError> {
        let path = self.protocol_dir(protocol_id).join(format!("{}.json", key));
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl ReportStore for JsonReportStore {
    async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError> {
        let dir = self.protocol_dir(&record.protocol_id);
        fs::create_dir_all(&dir)?;

        let key = record.calculated_at.timestamp_millis();
        let final_path = dir.join(format!("{}.json", key));

        let json = serde_json::to_string_pretty(record)?;
        let tmp_path = dir.join(format!(".{}.{}.json.tmp", key, std::process::id()));
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        // hard_link fails with AlreadyExists instead of replacing the target
        let linked = fs::hard_link(&tmp_path, &final_path);
        let _ = fs::remove_file(&tmp_path);
        linked.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StoreError::Io(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("record already stored at {}", final_path.display()),
                ))
            } else {
                StoreError::Io(e)
            }
        })?;

        log::debug!("✅ Score record written: {}", final_path.display());
        Ok(())
    }

    async fn latest(&self, protocol_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        match self.stored_keys(protocol_id)?.last() {
            Some(key) => self.read_record(protocol_id, *key).map(Some),
            None => Ok(None),
        }
    }

    async fn history(&self, protocol_id: &str) -> Result<Vec<ScoreRecord>, StoreError> {
        self.stored_keys(protocol_id)?
            .into_iter()
            .map(|key| self.read_record(protocol_id, key))
            .collect()
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::sample_record;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_latest_history() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();

        let first = sample_record("curve", 1_000, 20.0);
        let second = sample_record("curve", 9_000, 80.0);
        store.save(&second).await.unwrap();
        store.save(&first).await.unwrap();

        assert_eq!(store.latest("curve").await.unwrap(), Some(second.clone()));
        assert_eq!(store.history("curve").await.unwrap(), vec![first, second]);
        assert!(dir.path().join("curve").join("9000.json").exists());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();
        store.save(&sample_record("pendle", 5, 10.0)).await.unwrap();

        let names: Vec<String> = fs::read_dir(dir.path().join("pendle"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["5.json".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_record_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();
        store.save(&sample_record("lido", 7, 10.0)).await.unwrap();

        let err = store.save(&sample_record("lido", 7, 99.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == ErrorKind::AlreadyExists));
        assert_eq!(store.latest("lido").await.unwrap().unwrap().how3_score, 10.0);
    }

    #[tokio::test]
    async fn test_file_created_behind_the_store_is_kept() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();
        let protocol_dir = dir.path().join("frax");
        fs::create_dir_all(&protocol_dir).unwrap();
        fs::write(protocol_dir.join("11.json"), "written elsewhere").unwrap();

        let err = store.save(&sample_record("frax", 11, 40.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == ErrorKind::AlreadyExists));
        assert_eq!(
            fs::read_to_string(protocol_dir.join("11.json")).unwrap(),
            "written elsewhere"
        );

        let names: Vec<String> = fs::read_dir(&protocol_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["11.json".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_protocol_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();
        assert!(store.latest("nobody").await.unwrap().is_none());
        assert!(store.history("nobody").await.unwrap().is_empty());
    }
}
