use crate::sink::{RecordKind, RecordSink};
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// File-based record store: `<dir>/tasks/<id>.json` and `<dir>/workers/<id>.json`.
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    /// Open a store rooted at `dir`, creating the collection directories.
    pub async fn new(dir: impl Into<PathBuf>) -> ForemanResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(dir.join("tasks")).await?;
        tokio::fs::create_dir_all(dir.join("workers")).await?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection(&self, kind: RecordKind) -> PathBuf {
        match kind {
            RecordKind::Task => self.dir.join("tasks"),
            RecordKind::Worker => self.dir.join("workers"),
        }
    }

    fn record_path(&self, kind: RecordKind, id: Uuid) -> PathBuf {
        self.collection(kind).join(format!("{id}.json"))
    }

    /// Read one record; `None` if it was never written or was removed.
    pub async fn get(&self, kind: RecordKind, id: Uuid) -> ForemanResult<Option<serde_json::Value>> {
        let path = self.record_path(kind, id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let record = serde_json::from_str(&data)
            .map_err(|e| ForemanError::Store(format!("Failed to parse {kind} {id}: {e}")))?;
        Ok(Some(record))
    }

    /// Identifiers of every stored record of `kind`, in no particular order.
    pub async fn list(&self, kind: RecordKind) -> ForemanResult<Vec<Uuid>> {
        let mut entries = tokio::fs::read_dir(self.collection(kind)).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl RecordSink for FileRecordStore {
    async fn put(
        &self,
        kind: RecordKind,
        id: Uuid,
        record: &serde_json::Value,
    ) -> ForemanResult<()> {
        let path = self.record_path(kind, id);
        let json = serde_json::to_string_pretty(record)?;
        // Write then rename so readers never see a half-written record.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(%kind, %id, "Record stored");
        Ok(())
    }

    async fn remove(&self, kind: RecordKind, id: Uuid) -> ForemanResult<()> {
        let path = self.record_path(kind, id);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_corrupt_record_is_store_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(tmp.path()).await.unwrap();
        let id = Uuid::new_v4();
        tokio::fs::write(store.record_path(RecordKind::Task, id), "{not json")
            .await
            .unwrap();

        let err = store.get(RecordKind::Task, id).await.unwrap_err();
        assert!(matches!(err, ForemanError::Store(_)));
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(tmp.path()).await.unwrap();
        tokio::fs::write(tmp.path().join("workers").join("notes.txt"), "x")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("workers").join("bogus.json"), "{}")
            .await
            .unwrap();

        assert!(store.list(RecordKind::Worker).await.unwrap().is_empty());
    }
}
