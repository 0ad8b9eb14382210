//! Persistence collaborator for Foreman.
//!
//! The orchestrator emits a snapshot of a task or worker after every status
//! transition and counter update. Where those snapshots go is decided here:
//! [`NoopSink`] drops them, [`FileRecordStore`] writes one JSON file per
//! record.

/// The sink trait and the no-op sink.
pub mod sink;
/// JSON-file store.
pub mod store;

pub use sink::{NoopSink, RecordKind, RecordSink};
pub use store::FileRecordStore;
