//! Flat-file history persistence.
//!
//! One JSON document maps bot id -> profile name -> history entries
//! (newest first). The document is read once at start-up and rewritten
//! after every append; the pipeline itself never knows whether
//! persistence is on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use botlaunch_types::error::StoreError;
use botlaunch_types::job::HistoryEntry;

/// In-memory shape of the persisted document.
pub type HistorySnapshot = BTreeMap<String, BTreeMap<String, Vec<HistoryEntry>>>;

/// Handle to the persisted history document.
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the document. Missing or malformed files degrade to an empty
    /// history rather than failing start-up.
    pub async fn load(&self) -> HistorySnapshot {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return HistorySnapshot::new();
            }
            Err(err) => {
                tracing::warn!(
                    "failed to read history file {}: {err}, starting empty",
                    self.path.display()
                );
                return HistorySnapshot::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    "failed to parse history file {}: {err}, starting empty",
                    self.path.display()
                );
                HistorySnapshot::new()
            }
        }
    }

    /// Rewrite the whole document.
    pub async fn write(&self, snapshot: &HistorySnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botlaunch_types::job::JobStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(status: JobStatus) -> HistoryEntry {
        HistoryEntry {
            status,
            message: "done".to_string(),
            log: "log".to_string(),
            time: Utc::now(),
            comment: None,
        }
    }

    #[tokio::test]
    async fn roundtrip_preserves_structure() {
        let tmp = TempDir::new().unwrap();
        let file = HistoryFile::new(tmp.path().join("history.json"));

        let mut snapshot = HistorySnapshot::new();
        snapshot
            .entry("bot-1".to_string())
            .or_default()
            .entry("prod".to_string())
            .or_default()
            .push(entry(JobStatus::Success));
        file.write(&snapshot).await.unwrap();

        let loaded = file.load().await;
        assert_eq!(loaded["bot-1"]["prod"].len(), 1);
        assert_eq!(loaded["bot-1"]["prod"][0].status, JobStatus::Success);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let file = HistoryFile::new(tmp.path().join("absent.json"));
        assert!(file.load().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        tokio::fs::write(&path, "{broken").await.unwrap();
        let file = HistoryFile::new(path);
        assert!(file.load().await.is_empty());
    }
}
