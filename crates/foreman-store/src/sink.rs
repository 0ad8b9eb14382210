use async_trait::async_trait;
use foreman_core::ForemanResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Task snapshots.
    Task,
    /// Worker snapshots.
    Worker,
}

impl RecordKind {
    /// Lowercase name, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Task => "task",
            RecordKind::Worker => "worker",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives create/update/remove events for task and worker records.
///
/// Records are opaque JSON snapshots keyed by identifier; `put` is an upsert.
/// Callers must not let a sink failure affect task execution.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store the latest snapshot of a record, replacing any previous one.
    async fn put(&self, kind: RecordKind, id: Uuid, record: &serde_json::Value)
        -> ForemanResult<()>;

    /// Forget a record. Removing an unknown record is not an error.
    async fn remove(&self, kind: RecordKind, id: Uuid) -> ForemanResult<()>;
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl RecordSink for NoopSink {
    async fn put(
        &self,
        _kind: RecordKind,
        _id: Uuid,
        _record: &serde_json::Value,
    ) -> ForemanResult<()> {
        Ok(())
    }

    async fn remove(&self, _kind: RecordKind, _id: Uuid) -> ForemanResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_names() {
        assert_eq!(RecordKind::Task.to_string(), "task");
        assert_eq!(
            serde_json::to_string(&RecordKind::Worker).unwrap(),
            "\"worker\""
        );
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_everything() {
        let sink = NoopSink;
        let id = Uuid::new_v4();
        sink.put(RecordKind::Task, id, &serde_json::json!({"status": "pending"}))
            .await
            .unwrap();
        sink.remove(RecordKind::Task, id).await.unwrap();
    }
}
