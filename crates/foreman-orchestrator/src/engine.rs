use crate::analyzer::TaskAnalyzer;
use crate::executor::TaskExecutor;
use crate::pool::WorkerPool;
use crate::types::{ExecutionResult, Task, TaskAnalysis};
use foreman_core::{ForemanError, ForemanResult, Priority, TaskCategory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::info;

/// A unit of work as handed in by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Free-text description of the work.
    pub description: String,
    /// Requested priority; analysis may raise or lower it.
    #[serde(default)]
    pub priority: Priority,
    /// Preset category. Anything other than `general` survives analysis.
    #[serde(default)]
    pub category: Option<TaskCategory>,
}

impl TaskRequest {
    /// Create a medium-priority request with no preset category.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            priority: Priority::default(),
            category: None,
        }
    }

    /// Set the requested priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Preset the category.
    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Everything a submission produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The task in its terminal state.
    pub task: Task,
    /// Analysis the worker was chosen by.
    pub analysis: TaskAnalysis,
    /// Execution record.
    pub execution: ExecutionResult,
}

/// Submission facade: analyze, claim a worker, execute.
///
/// At most `max_concurrent_tasks` submissions run at once; the rest wait on
/// a semaphore permit in arrival order.
pub struct Orchestrator {
    analyzer: TaskAnalyzer,
    pool: Arc<WorkerPool>,
    executor: TaskExecutor,
    permits: Arc<Semaphore>,
    max_concurrent_tasks: usize,
}

impl Orchestrator {
    /// Build over an executor; the pool is taken from it. A zero limit is
    /// raised to one.
    pub fn new(
        analyzer: TaskAnalyzer,
        executor: TaskExecutor,
        max_concurrent_tasks: usize,
    ) -> Self {
        let max_concurrent_tasks = max_concurrent_tasks.max(1);
        Self {
            analyzer,
            pool: Arc::clone(executor.pool()),
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent_tasks)),
            max_concurrent_tasks,
        }
    }

    /// Get a reference to the analyzer.
    pub fn analyzer(&self) -> &TaskAnalyzer {
        &self.analyzer
    }

    /// Get a reference to the worker pool.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Get a reference to the executor.
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Free submission slots right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refuse all further submissions. Running ones finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Analyze without executing.
    pub async fn analyze(&self, description: &str, priority: Priority) -> TaskAnalysis {
        self.analyzer.analyze(description, priority).await
    }

    /// Submit and wait for a free slot if all are taken.
    pub async fn submit(&self, request: TaskRequest) -> ForemanResult<SubmissionOutcome> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ForemanError::Capacity("orchestrator is closed".to_string()))?;
        Ok(self.process(request).await)
    }

    /// Submit only if a slot is free right now.
    pub async fn try_submit(&self, request: TaskRequest) -> ForemanResult<SubmissionOutcome> {
        let _permit = self.permits.try_acquire().map_err(|e| match e {
            TryAcquireError::NoPermits => ForemanError::Capacity(format!(
                "all {} task slots are busy",
                self.max_concurrent_tasks
            )),
            TryAcquireError::Closed => {
                ForemanError::Capacity("orchestrator is closed".to_string())
            }
        })?;
        Ok(self.process(request).await)
    }

    async fn process(&self, request: TaskRequest) -> SubmissionOutcome {
        let start = Instant::now();
        let mut task = Task::new(request.description, request.priority);
        if let Some(category) = request.category {
            task.category = category;
        }
        self.executor.register(&task).await;

        let analysis = self.analyzer.analyze_task(&task).await;
        if task.category == TaskCategory::General {
            task.category = analysis.category;
        }
        task.priority = analysis.suggested_priority;
        task.analysis = Some(analysis.clone());
        info!(
            task_id = %task.id,
            category = %task.category,
            priority = %task.priority,
            "Task routed"
        );

        let worker = self.pool.acquire_for(&analysis, task.id).await;
        let execution = self.executor.execute(&mut task, &worker).await;

        info!(
            task_id = %task.id,
            status = %task.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Submission finished"
        );
        SubmissionOutcome {
            task,
            analysis,
            execution,
        }
    }

    /// Pool and executor state as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "pool": self.pool.to_json().await,
            "executor": self.executor.stats().await,
            "available_slots": self.available_slots(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::profiles::WorkerProfileFactory;
    use crate::types::TaskStatus;
    use async_trait::async_trait;
    use foreman_agent::{
        BackendHealth, GenerationBackend, GenerationRequest, GenerationResponse, LocalBackend,
    };
    use foreman_core::Archetype;
    use std::time::Duration;

    fn orchestrator(backend: Arc<dyn GenerationBackend>, slots: usize) -> Orchestrator {
        let pool = Arc::new(WorkerPool::new(
            WorkerProfileFactory::new(),
            PoolConfig::default(),
        ));
        let executor = TaskExecutor::new(backend, pool, Duration::from_secs(5));
        Orchestrator::new(TaskAnalyzer::new().unwrap(), executor, slots)
    }

    struct SlowBackend;

    #[async_trait]
    impl GenerationBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _request: &GenerationRequest) -> ForemanResult<GenerationResponse> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(GenerationResponse::ok("done"))
        }

        async fn health(&self) -> Vec<BackendHealth> {
            vec![BackendHealth::available("slow", "test")]
        }
    }

    #[tokio::test]
    async fn test_submit_runs_whole_pipeline() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 2);
        let outcome = orch
            .submit(TaskRequest::new("Write a Python function to sort a list"))
            .await
            .unwrap();

        assert_eq!(outcome.task.status, TaskStatus::Completed);
        assert_eq!(outcome.task.category, TaskCategory::CodeGeneration);
        assert_eq!(outcome.analysis.suggested_archetype, Archetype::CodeGenerator);
        assert_eq!(outcome.execution.status, TaskStatus::Completed);
        assert_eq!(orch.pool().len().await, 1);
        assert_eq!(orch.available_slots(), 2);

        let stored = orch.executor().get_task(outcome.task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_preset_category_is_kept() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 1);
        let outcome = orch
            .submit(
                TaskRequest::new("Write a function that parses dates")
                    .with_category(TaskCategory::Research),
            )
            .await
            .unwrap();
        assert_eq!(outcome.task.category, TaskCategory::Research);
        assert_eq!(outcome.analysis.category, TaskCategory::CodeGeneration);
    }

    #[tokio::test]
    async fn test_general_preset_is_replaced() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 1);
        let outcome = orch
            .submit(
                TaskRequest::new("Translate this paragraph into German")
                    .with_category(TaskCategory::General),
            )
            .await
            .unwrap();
        assert_eq!(outcome.task.category, TaskCategory::Translation);
    }

    #[tokio::test]
    async fn test_workers_are_reused_between_submissions() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 1);
        let first = orch
            .submit(TaskRequest::new("Write a function that adds numbers"))
            .await
            .unwrap();
        let second = orch
            .submit(TaskRequest::new("Write a function that multiplies numbers"))
            .await
            .unwrap();
        assert_eq!(first.execution.worker_id, second.execution.worker_id);
        assert_eq!(orch.pool().len().await, 1);
    }

    #[tokio::test]
    async fn test_try_submit_rejects_when_saturated() {
        let orch = Arc::new(orchestrator(Arc::new(SlowBackend), 1));
        let busy = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.submit(TaskRequest::new("first task")).await })
        };
        while orch.available_slots() > 0 {
            tokio::task::yield_now().await;
        }

        let err = orch
            .try_submit(TaskRequest::new("second task"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForemanError::Capacity(_)));

        busy.await.unwrap().unwrap();
        assert!(orch.try_submit(TaskRequest::new("third task")).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_orchestrator_refuses_submissions() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 1);
        orch.close();
        let err = orch.submit(TaskRequest::new("anything")).await.unwrap_err();
        assert!(matches!(err, ForemanError::Capacity(_)));
    }

    #[tokio::test]
    async fn test_to_json_reports_pool_and_executor() {
        let orch = orchestrator(Arc::new(LocalBackend::new()), 3);
        orch.submit(TaskRequest::new("Summarize the report"))
            .await
            .unwrap();
        let json = orch.to_json().await;
        assert_eq!(json["executor"]["completed_tasks"], 1);
        assert_eq!(json["pool"]["stats"]["total_workers"], 1);
        assert_eq!(json["available_slots"], 3);
    }

    #[test]
    fn test_task_request_defaults() {
        let request: TaskRequest =
            serde_json::from_str(r#"{"description": "do it"}"#).unwrap();
        assert_eq!(request.priority, Priority::Medium);
        assert!(request.category.is_none());
    }
}
