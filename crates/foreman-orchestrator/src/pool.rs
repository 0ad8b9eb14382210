use crate::profiles::WorkerProfileFactory;
use crate::types::{PoolStats, TaskAnalysis, Worker, WorkerPerformance, WorkerStatus};
use chrono::{DateTime, Utc};
use foreman_store::{RecordKind, RecordSink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pool sizing and eviction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Size cap enforced by [`WorkerPool::enforce_pool_cap`].
    pub max_workers: usize,
    /// Idle workers older than this are removed by [`WorkerPool::optimize`].
    pub idle_timeout_secs: u64,
    /// Share of the pool evicted at once under pool pressure.
    pub eviction_fraction: f64,
    /// Period of the background [`WorkerPool::optimize`] task.
    pub maintenance_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 50,
            idle_timeout_secs: 1800,
            eviction_fraction: 0.2,
            maintenance_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    /// `idle_timeout_secs` as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// `maintenance_interval_secs` as a [`Duration`].
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

/// Owns every live worker.
///
/// All mutations take the write lock for their whole read-modify-write, so a
/// worker removed by cleanup between two calls is simply reported as missing
/// by the second one. Mutations on unknown workers are no-ops returning
/// `false`.
pub struct WorkerPool {
    workers: Arc<RwLock<HashMap<Uuid, Worker>>>,
    factory: WorkerProfileFactory,
    config: PoolConfig,
    sink: Option<Arc<dyn RecordSink>>,
    next_seq: AtomicU64,
}

impl WorkerPool {
    /// Create an empty pool.
    pub fn new(factory: WorkerProfileFactory, config: PoolConfig) -> Self {
        Self {
            workers: Arc::new(RwLock::new(HashMap::new())),
            factory,
            config,
            sink: None,
            next_seq: AtomicU64::new(1),
        }
    }

    /// Emit a worker snapshot to `sink` after every mutation.
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get a reference to the pool config.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get a reference to the profile factory.
    pub fn factory(&self) -> &WorkerProfileFactory {
        &self.factory
    }

    /// Build a worker for the analysis' suggested archetype and register it
    /// as IDLE. A spec that fails validation is replaced by the fallback
    /// worker; this never fails.
    pub async fn create_worker_for(&self, analysis: &TaskAnalysis) -> Worker {
        let worker = self.build_worker(analysis);
        self.workers.write().await.insert(worker.id, worker.clone());
        self.emit(&worker).await;
        worker
    }

    fn build_worker(&self, analysis: &TaskAnalysis) -> Worker {
        let archetype = analysis.suggested_archetype;
        let spec = match self.factory.build_validated(archetype, analysis) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(%archetype, error = %e, "Worker spec rejected, creating fallback worker");
                WorkerProfileFactory::fallback_spec()
            }
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut worker = Worker::from_spec(spec);
        worker.name = format!("{} {seq}", worker.name);
        info!(
            worker_id = %worker.id,
            name = %worker.name,
            archetype = %worker.archetype,
            "Worker created"
        );
        worker
    }

    /// Claim a worker for `task_id` in one step: reuse the most efficient
    /// IDLE worker of the suggested archetype, or create one. The claimed
    /// worker is BUSY with the task reserved, so cleanup cannot evict it
    /// before execution starts. At the size cap, idle workers are evicted
    /// first to make room; if none can be evicted the cap is exceeded.
    pub async fn acquire_for(&self, analysis: &TaskAnalysis, task_id: Uuid) -> Worker {
        let archetype = analysis.suggested_archetype;
        let (worker, evicted) = {
            let mut workers = self.workers.write().await;

            let reusable = workers
                .values()
                .filter(|w| w.status == WorkerStatus::Idle && w.archetype == archetype)
                .max_by(|a, b| {
                    a.efficiency()
                        .total_cmp(&b.efficiency())
                        .then(b.created_at.cmp(&a.created_at))
                })
                .map(|w| w.id);

            let mut evicted = Vec::new();
            let claimed = match reusable.and_then(|id| workers.get_mut(&id)) {
                Some(worker) => {
                    debug!(worker_id = %worker.id, %task_id, "Reusing idle worker");
                    worker.status = WorkerStatus::Busy;
                    worker.current_task = Some(task_id);
                    worker.last_activity = Utc::now();
                    worker.clone()
                }
                None => {
                    if workers.len() >= self.config.max_workers {
                        let target = self.config.max_workers.saturating_sub(1);
                        evicted = select_evictions(&workers, target, self.config.eviction_fraction);
                        for id in &evicted {
                            workers.remove(id);
                        }
                        if workers.len() >= self.config.max_workers {
                            warn!(
                                size = workers.len(),
                                max_workers = self.config.max_workers,
                                "Pool at capacity with no idle workers to evict"
                            );
                        }
                    }
                    let mut worker = self.build_worker(analysis);
                    worker.status = WorkerStatus::Busy;
                    worker.current_task = Some(task_id);
                    workers.insert(worker.id, worker.clone());
                    worker
                }
            };
            (claimed, evicted)
        };

        for id in evicted {
            info!(worker_id = %id, "Evicted idle worker to make room");
            self.emit_removed(id).await;
        }
        self.emit(&worker).await;
        worker
    }

    /// Snapshot of a worker.
    pub async fn get(&self, id: Uuid) -> Option<Worker> {
        self.workers.read().await.get(&id).cloned()
    }

    /// Number of workers, stopped ones included.
    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Whether the pool holds no workers.
    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }

    /// Workers that are IDLE, WORKING or BUSY, oldest first.
    pub async fn list_active(&self) -> Vec<Worker> {
        let workers = self.workers.read().await;
        let mut active: Vec<Worker> = workers
            .values()
            .filter(|w| w.status.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|w| w.created_at);
        active
    }

    /// Stop a worker and clear its current task.
    pub async fn stop(&self, id: Uuid) -> bool {
        let stopped = self
            .update(id, |w| {
                w.status = WorkerStatus::Stopped;
                w.current_task = None;
            })
            .await;
        if stopped {
            info!(worker_id = %id, "Worker stopped");
        }
        stopped
    }

    /// Set status and current task. Refuses to put a worker to work on a
    /// task while it still holds a different one.
    pub async fn mark_status(&self, id: Uuid, status: WorkerStatus, task_id: Option<Uuid>) -> bool {
        let snapshot = {
            let mut workers = self.workers.write().await;
            let Some(worker) = workers.get_mut(&id) else {
                return false;
            };
            let claims_task = matches!(status, WorkerStatus::Working | WorkerStatus::Busy);
            if claims_task {
                if let (Some(current), Some(new)) = (worker.current_task, task_id) {
                    if current != new {
                        warn!(
                            worker_id = %id,
                            current_task = %current,
                            requested_task = %new,
                            "Worker already holds another task"
                        );
                        return false;
                    }
                }
            }
            worker.status = status;
            worker.current_task = task_id;
            worker.last_activity = Utc::now();
            debug!(worker_id = %id, %status, "Worker status changed");
            worker.clone()
        };
        self.emit(&snapshot).await;
        true
    }

    /// Count a completion and fold `quality` into the running mean:
    /// `avg' = (avg * (n - 1) + quality) / n` with `n` the new completed count.
    pub async fn record_completion(&self, id: Uuid, task_id: Uuid, quality: Option<f64>) -> bool {
        let updated = self
            .update(id, |w| {
                w.tasks_completed += 1;
                if let Some(q) = quality {
                    let n = f64::from(w.tasks_completed);
                    w.average_quality_score = (w.average_quality_score * (n - 1.0) + q) / n;
                }
                w.task_history.push(task_id);
                w.current_task = None;
                w.status = WorkerStatus::Idle;
            })
            .await;
        if updated {
            info!(worker_id = %id, %task_id, quality = ?quality, "Worker completed task");
        }
        updated
    }

    /// Count a failure. The quality average is left alone.
    pub async fn record_failure(&self, id: Uuid, task_id: Uuid, error: Option<&str>) -> bool {
        let updated = self
            .update(id, |w| {
                w.tasks_failed += 1;
                w.current_task = None;
                w.status = WorkerStatus::Idle;
            })
            .await;
        if updated {
            warn!(worker_id = %id, %task_id, error = error.unwrap_or("unknown"), "Worker failed task");
        }
        updated
    }

    /// Add to a worker's accumulated execution time.
    pub async fn record_execution_time(&self, id: Uuid, execution_time_ms: u64) -> bool {
        self.update(id, |w| {
            w.total_execution_time_ms = w.total_execution_time_ms.saturating_add(execution_time_ms);
        })
        .await
    }

    /// Remove IDLE workers inactive for longer than `max_idle`.
    pub async fn cleanup_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        self.cleanup_idle_at(Utc::now(), max_idle).await
    }

    /// [`Self::cleanup_idle`] as seen at time `now`.
    pub async fn cleanup_idle_at(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<Uuid> {
        let removed: Vec<Uuid> = {
            let mut workers = self.workers.write().await;
            let stale: Vec<Uuid> = workers
                .values()
                .filter(|w| {
                    w.status == WorkerStatus::Idle
                        && (now - w.last_activity).to_std().unwrap_or_default() > max_idle
                })
                .map(|w| w.id)
                .collect();
            for id in &stale {
                workers.remove(id);
            }
            stale
        };

        for id in &removed {
            info!(worker_id = %id, "Removed idle worker");
            self.emit_removed(*id).await;
        }
        removed
    }

    /// Evict the least efficient IDLE workers when the pool exceeds
    /// `max_workers`. Removes `max(len - max_workers, floor(len * fraction))`
    /// workers, or fewer if not enough are idle. WORKING and BUSY workers
    /// are never touched.
    pub async fn enforce_pool_cap(&self, max_workers: usize) -> Vec<Uuid> {
        let evicted = {
            let mut workers = self.workers.write().await;
            let evicted = select_evictions(&workers, max_workers, self.config.eviction_fraction);
            for id in &evicted {
                workers.remove(id);
            }
            if workers.len() > max_workers {
                warn!(
                    size = workers.len(),
                    max_workers,
                    "Pool still above cap, not enough idle workers"
                );
            }
            evicted
        };

        for id in &evicted {
            info!(worker_id = %id, "Evicted inefficient worker");
            self.emit_removed(*id).await;
        }
        evicted
    }

    /// Idle cleanup followed by cap enforcement, using the pool config.
    pub async fn optimize(&self) -> Vec<Uuid> {
        let mut removed = self.cleanup_idle(self.config.idle_timeout()).await;
        removed.extend(self.enforce_pool_cap(self.config.max_workers).await);
        removed
    }

    /// Run [`Self::optimize`] every `interval` until the handle is aborted.
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = pool.optimize().await;
                if !removed.is_empty() {
                    info!(removed = removed.len(), "Pool maintenance removed workers");
                }
            }
        })
    }

    /// Aggregate counts over every worker.
    pub async fn stats(&self) -> PoolStats {
        let workers = self.workers.read().await;
        let mut stats = PoolStats {
            total_workers: workers.len(),
            ..PoolStats::default()
        };

        let mut quality_sum = 0.0;
        for worker in workers.values() {
            if worker.status.is_active() {
                stats.active_workers += 1;
            }
            *stats.by_archetype.entry(worker.archetype).or_default() += 1;
            *stats.by_status.entry(worker.status).or_default() += 1;
            stats.total_completed += u64::from(worker.tasks_completed);
            stats.total_failed += u64::from(worker.tasks_failed);
            quality_sum += worker.average_quality_score;
        }

        let total_tasks = stats.total_completed + stats.total_failed;
        if total_tasks > 0 {
            stats.success_rate = stats.total_completed as f64 / total_tasks as f64;
        }
        if !workers.is_empty() {
            stats.average_quality_score = quality_sum / workers.len() as f64;
        }
        stats
    }

    /// Performance report for one worker.
    pub async fn performance(&self, id: Uuid) -> Option<WorkerPerformance> {
        let workers = self.workers.read().await;
        let w = workers.get(&id)?;
        let average_execution_time_ms = if w.tasks_completed > 0 {
            w.total_execution_time_ms as f64 / f64::from(w.tasks_completed)
        } else {
            0.0
        };
        Some(WorkerPerformance {
            worker_id: w.id,
            name: w.name.clone(),
            archetype: w.archetype,
            status: w.status,
            tasks_completed: w.tasks_completed,
            tasks_failed: w.tasks_failed,
            success_rate: w.success_rate(),
            average_quality_score: w.average_quality_score,
            total_execution_time_ms: w.total_execution_time_ms,
            average_execution_time_ms,
            last_activity: w.last_activity,
        })
    }

    /// Serialize the pool as JSON: active (non-stopped) workers plus
    /// aggregate stats over all of them.
    pub async fn to_json(&self) -> serde_json::Value {
        let workers = self.list_active().await;
        let stats = self.stats().await;
        serde_json::json!({
            "workers": workers,
            "stats": stats,
        })
    }

    /// Apply `f` to a worker, refresh its activity time and emit it.
    async fn update(&self, id: Uuid, f: impl FnOnce(&mut Worker)) -> bool {
        let snapshot = {
            let mut workers = self.workers.write().await;
            let Some(worker) = workers.get_mut(&id) else {
                return false;
            };
            f(worker);
            worker.last_activity = Utc::now();
            worker.clone()
        };
        self.emit(&snapshot).await;
        true
    }

    async fn emit(&self, worker: &Worker) {
        let Some(sink) = &self.sink else { return };
        let result = match serde_json::to_value(worker) {
            Ok(record) => sink.put(RecordKind::Worker, worker.id, &record).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(worker_id = %worker.id, error = %e, "Failed to persist worker");
        }
    }

    async fn emit_removed(&self, id: Uuid) {
        let Some(sink) = &self.sink else { return };
        if let Err(e) = sink.remove(RecordKind::Worker, id).await {
            warn!(worker_id = %id, error = %e, "Failed to persist worker removal");
        }
    }
}

/// IDLE workers to evict so the pool shrinks toward `max_workers`, least
/// efficient first (ties: oldest first).
fn select_evictions(
    workers: &HashMap<Uuid, Worker>,
    max_workers: usize,
    fraction: f64,
) -> Vec<Uuid> {
    let len = workers.len();
    if len <= max_workers {
        return Vec::new();
    }
    let by_fraction = (len as f64 * fraction).floor() as usize;
    let wanted = (len - max_workers).max(by_fraction);

    let mut idle: Vec<&Worker> = workers
        .values()
        .filter(|w| w.status == WorkerStatus::Idle)
        .collect();
    idle.sort_by(|a, b| {
        a.efficiency()
            .total_cmp(&b.efficiency())
            .then(a.created_at.cmp(&b.created_at))
    });
    idle.into_iter().take(wanted).map(|w| w.id).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::profiles::{ProfileOverride, FALLBACK_WORKER_NAME};
    use foreman_core::{Archetype, ForemanResult, Priority};
    use std::sync::Mutex;

    fn analysis(archetype: Archetype) -> TaskAnalysis {
        let mut a = TaskAnalysis::conservative("task", Priority::Medium);
        a.suggested_archetype = archetype;
        a
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(WorkerProfileFactory::new(), PoolConfig::default())
    }

    #[derive(Default)]
    struct RecordingSink {
        puts: Mutex<Vec<Uuid>>,
        removes: Mutex<Vec<Uuid>>,
    }

    #[async_trait::async_trait]
    impl RecordSink for RecordingSink {
        async fn put(&self, _: RecordKind, id: Uuid, _: &serde_json::Value) -> ForemanResult<()> {
            self.puts.lock().unwrap().push(id);
            Ok(())
        }
        async fn remove(&self, _: RecordKind, id: Uuid) -> ForemanResult<()> {
            self.removes.lock().unwrap().push(id);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl RecordSink for FailingSink {
        async fn put(&self, _: RecordKind, _: Uuid, _: &serde_json::Value) -> ForemanResult<()> {
            Err(foreman_core::ForemanError::Store("disk full".into()))
        }
        async fn remove(&self, _: RecordKind, _: Uuid) -> ForemanResult<()> {
            Err(foreman_core::ForemanError::Store("disk full".into()))
        }
    }

    #[tokio::test]
    async fn test_create_worker_starts_idle() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::CodeGenerator)).await;
        assert_eq!(worker.status, WorkerStatus::Idle);
        assert_eq!(worker.archetype, Archetype::CodeGenerator);
        assert!(worker.name.starts_with("Code Generator"));
        assert_eq!(pool.get(worker.id).await.unwrap().id, worker.id);
        assert_eq!(pool.list_active().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_yields_fallback_worker() {
        let mut overrides = HashMap::new();
        overrides.insert(
            Archetype::Translator,
            ProfileOverride {
                temperature: Some(5.0),
                ..ProfileOverride::default()
            },
        );
        let pool = WorkerPool::new(
            WorkerProfileFactory::with_overrides(overrides),
            PoolConfig::default(),
        );

        let worker = pool.create_worker_for(&analysis(Archetype::Translator)).await;
        assert_eq!(worker.archetype, Archetype::General);
        assert!(worker.name.starts_with(FALLBACK_WORKER_NAME));
        assert_eq!(worker.capability_level("general_reasoning"), Some(0.7));
        assert_eq!(worker.capability_level("text_processing"), Some(0.6));
    }

    #[tokio::test]
    async fn test_first_completion_sets_average_exactly() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::General)).await;
        let task = Uuid::new_v4();

        pool.mark_status(worker.id, WorkerStatus::Working, Some(task)).await;
        assert!(pool.record_completion(worker.id, task, Some(0.8)).await);

        let w = pool.get(worker.id).await.unwrap();
        assert_eq!(w.average_quality_score, 0.8);
        assert_eq!(w.tasks_completed, 1);
        assert_eq!(w.task_history, vec![task]);
        assert_eq!(w.status, WorkerStatus::Idle);
        assert!(w.current_task.is_none());
    }

    #[tokio::test]
    async fn test_running_mean_across_completions() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::General)).await;
        for q in [0.6, 0.9, 0.9] {
            pool.record_completion(worker.id, Uuid::new_v4(), Some(q)).await;
        }
        let w = pool.get(worker.id).await.unwrap();
        assert!((w.average_quality_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_does_not_touch_quality() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::General)).await;
        pool.record_completion(worker.id, Uuid::new_v4(), Some(0.9)).await;

        let task = Uuid::new_v4();
        pool.mark_status(worker.id, WorkerStatus::Working, Some(task)).await;
        assert!(pool.record_failure(worker.id, task, Some("boom")).await);

        let w = pool.get(worker.id).await.unwrap();
        assert_eq!(w.average_quality_score, 0.9);
        assert_eq!(w.tasks_failed, 1);
        assert_eq!(w.status, WorkerStatus::Idle);
        assert!(w.current_task.is_none());
    }

    #[tokio::test]
    async fn test_unknown_worker_mutations_are_noops() {
        let pool = pool();
        let ghost = Uuid::new_v4();
        assert!(!pool.mark_status(ghost, WorkerStatus::Working, None).await);
        assert!(!pool.record_completion(ghost, Uuid::new_v4(), Some(1.0)).await);
        assert!(!pool.record_failure(ghost, Uuid::new_v4(), None).await);
        assert!(!pool.stop(ghost).await);
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_one_task_per_worker() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::General)).await;
        let first = Uuid::new_v4();
        assert!(pool.mark_status(worker.id, WorkerStatus::Working, Some(first)).await);
        assert!(!pool.mark_status(worker.id, WorkerStatus::Working, Some(Uuid::new_v4())).await);
        assert_eq!(pool.get(worker.id).await.unwrap().current_task, Some(first));
    }

    #[tokio::test]
    async fn test_stop_clears_task_and_leaves_active_list() {
        let pool = pool();
        let worker = pool.create_worker_for(&analysis(Archetype::General)).await;
        pool.mark_status(worker.id, WorkerStatus::Busy, Some(Uuid::new_v4())).await;
        assert!(pool.stop(worker.id).await);

        let w = pool.get(worker.id).await.unwrap();
        assert_eq!(w.status, WorkerStatus::Stopped);
        assert!(w.current_task.is_none());
        assert!(pool.list_active().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_idle_is_idempotent() {
        let pool = pool();
        let stale = pool.create_worker_for(&analysis(Archetype::General)).await;
        let busy = pool.create_worker_for(&analysis(Archetype::General)).await;
        pool.mark_status(busy.id, WorkerStatus::Working, Some(Uuid::new_v4())).await;

        let later = Utc::now() + chrono::Duration::minutes(31);
        let limit = Duration::from_secs(30 * 60);

        let removed = pool.cleanup_idle_at(later, limit).await;
        assert_eq!(removed, vec![stale.id]);
        assert!(pool.cleanup_idle_at(later, limit).await.is_empty());
        assert!(pool.get(busy.id).await.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recently_active() {
        let pool = pool();
        pool.create_worker_for(&analysis(Archetype::General)).await;
        assert!(pool.cleanup_idle(Duration::from_secs(60)).await.is_empty());
        assert_eq!(pool.len().await, 1);
    }

    /// Ten workers: seven working, three idle with the lowest efficiency.
    async fn pressured_pool() -> (WorkerPool, Vec<Uuid>, Vec<Uuid>) {
        let pool = pool();
        let mut idle = Vec::new();
        let mut working = Vec::new();
        for i in 0..10u32 {
            let w = pool.create_worker_for(&analysis(Archetype::General)).await;
            if i < 3 {
                for _ in 0..i {
                    pool.record_completion(w.id, Uuid::new_v4(), Some(0.5)).await;
                }
                idle.push(w.id);
            } else {
                for _ in 0..3 {
                    pool.record_completion(w.id, Uuid::new_v4(), Some(0.9)).await;
                }
                pool.mark_status(w.id, WorkerStatus::Working, Some(Uuid::new_v4())).await;
                working.push(w.id);
            }
        }
        (pool, idle, working)
    }

    #[tokio::test]
    async fn test_pool_cap_evicts_least_efficient_idle_workers() {
        let (pool, idle, working) = pressured_pool().await;

        let evicted = pool.enforce_pool_cap(8).await;
        assert_eq!(evicted.len(), 2);
        assert_eq!(pool.len().await, 8);
        // Idle efficiencies are 0, 0.5 and 1.0.
        assert_eq!(evicted, vec![idle[0], idle[1]]);
        for id in working {
            assert!(pool.get(id).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_pool_cap_never_evicts_working_workers() {
        let (pool, idle, _) = pressured_pool().await;
        let evicted = pool.enforce_pool_cap(2).await;
        assert_eq!(evicted.len(), idle.len());
        assert_eq!(pool.len().await, 7);
    }

    #[tokio::test]
    async fn test_pool_under_cap_is_untouched() {
        let (pool, _, _) = pressured_pool().await;
        assert!(pool.enforce_pool_cap(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_acquire_reuses_idle_worker_of_same_archetype() {
        let pool = pool();
        let existing = pool.create_worker_for(&analysis(Archetype::Researcher)).await;
        pool.create_worker_for(&analysis(Archetype::Translator)).await;

        let task = Uuid::new_v4();
        let claimed = pool.acquire_for(&analysis(Archetype::Researcher), task).await;
        assert_eq!(claimed.id, existing.id);
        assert_eq!(claimed.status, WorkerStatus::Busy);
        assert_eq!(claimed.current_task, Some(task));
        assert_eq!(pool.len().await, 2);

        // The only researcher is busy now, so a new one is created.
        let second = pool.acquire_for(&analysis(Archetype::Researcher), Uuid::new_v4()).await;
        assert_ne!(second.id, existing.id);
        assert_eq!(pool.len().await, 3);
    }

    #[tokio::test]
    async fn test_acquire_at_capacity_evicts_first() {
        let config = PoolConfig {
            max_workers: 5,
            ..PoolConfig::default()
        };
        let pool = WorkerPool::new(WorkerProfileFactory::new(), config);
        for _ in 0..5 {
            pool.create_worker_for(&analysis(Archetype::General)).await;
        }

        let claimed = pool.acquire_for(&analysis(Archetype::Summarizer), Uuid::new_v4()).await;
        assert_eq!(claimed.archetype, Archetype::Summarizer);
        assert!(pool.len().await <= 5);
    }

    #[tokio::test]
    async fn test_stats_and_performance() {
        let pool = pool();
        let a = pool.create_worker_for(&analysis(Archetype::CodeGenerator)).await;
        let b = pool.create_worker_for(&analysis(Archetype::DataAnalyst)).await;

        pool.record_completion(a.id, Uuid::new_v4(), Some(0.8)).await;
        pool.record_execution_time(a.id, 1200).await;
        pool.record_failure(b.id, Uuid::new_v4(), None).await;
        pool.record_execution_time(b.id, 300).await;

        let stats = pool.stats().await;
        assert_eq!(stats.total_workers, 2);
        assert_eq!(stats.active_workers, 2);
        assert_eq!(stats.by_archetype.get(&Archetype::CodeGenerator), Some(&1));
        assert_eq!(stats.by_status.get(&WorkerStatus::Idle), Some(&2));
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
        assert!((stats.average_quality_score - 0.4).abs() < 1e-9);

        let perf = pool.performance(a.id).await.unwrap();
        assert_eq!(perf.tasks_completed, 1);
        assert_eq!(perf.total_execution_time_ms, 1200);
        assert!((perf.average_execution_time_ms - 1200.0).abs() < 1e-9);
        assert!(pool.performance(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_pool_stats_are_zero() {
        let stats = pool().stats().await;
        assert_eq!(stats.total_workers, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_quality_score, 0.0);
    }

    #[tokio::test]
    async fn test_json_lists_active_workers_and_counts_all() {
        let pool = pool();
        let kept = pool.create_worker_for(&analysis(Archetype::General)).await;
        let stopped = pool.create_worker_for(&analysis(Archetype::CodeGenerator)).await;
        pool.stop(stopped.id).await;

        let json = pool.to_json().await;
        let workers = json["workers"].as_array().unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0]["id"], kept.id.to_string());
        assert_eq!(json["stats"]["total_workers"], 2);
        assert_eq!(json["stats"]["active_workers"], 1);
    }

    #[tokio::test]
    async fn test_sink_receives_snapshots_and_removals() {
        let sink = Arc::new(RecordingSink::default());
        let pool = pool().with_sink(sink.clone());
        let w = pool.create_worker_for(&analysis(Archetype::General)).await;
        pool.record_completion(w.id, Uuid::new_v4(), Some(0.7)).await;
        pool.cleanup_idle_at(Utc::now() + chrono::Duration::hours(1), Duration::from_secs(60))
            .await;

        assert_eq!(sink.puts.lock().unwrap().len(), 2);
        assert_eq!(*sink.removes.lock().unwrap(), vec![w.id]);
    }

    #[tokio::test]
    async fn test_sink_failures_are_swallowed() {
        let pool = pool().with_sink(Arc::new(FailingSink));
        let w = pool.create_worker_for(&analysis(Archetype::General)).await;
        assert!(pool.record_completion(w.id, Uuid::new_v4(), Some(0.7)).await);
        assert_eq!(pool.get(w.id).await.unwrap().tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_maintenance_task_runs_optimize() {
        let config = PoolConfig {
            idle_timeout_secs: 0,
            ..PoolConfig::default()
        };
        let pool = Arc::new(WorkerPool::new(WorkerProfileFactory::new(), config));
        pool.create_worker_for(&analysis(Archetype::General)).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let handle = pool.spawn_maintenance(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(pool.is_empty().await);
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_workers, 50);
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
        let parsed: PoolConfig = serde_json::from_str(r#"{"max_workers": 3}"#).unwrap();
        assert_eq!(parsed.max_workers, 3);
        assert_eq!(parsed.eviction_fraction, 0.2);
    }
}
