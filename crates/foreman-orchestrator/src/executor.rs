use crate::fallback::with_fallback;
use crate::pool::WorkerPool;
use crate::types::{
    ExecutionResult, ExecutorStats, Task, TaskStatus, Worker, WorkerResponse, WorkerStatus,
};
use chrono::Utc;
use foreman_agent::{GenerationBackend, GenerationRequest};
use foreman_core::{Archetype, Complexity, ForemanError, Priority};
use foreman_store::{RecordKind, RecordSink};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// `[executor]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Tasks allowed in flight at once; further submissions wait for a slot.
    pub max_concurrent_tasks: usize,
    /// Priority given to submissions that do not name one.
    pub default_priority: Priority,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            default_priority: Priority::Medium,
        }
    }
}

/// Runs one task on one worker against the generation backend.
///
/// `execute` always leaves the task COMPLETED or FAILED and hands the worker
/// back to the pool as IDLE. Backend failures never fail a task: they are
/// replaced by a per-archetype template marked `fallback_mode`.
pub struct TaskExecutor {
    backend: Arc<dyn GenerationBackend>,
    pool: Arc<WorkerPool>,
    generation_timeout: Duration,
    active: RwLock<HashMap<Uuid, Task>>,
    finished: RwLock<HashMap<Uuid, (Task, ExecutionResult)>>,
    sink: Option<Arc<dyn RecordSink>>,
}

impl TaskExecutor {
    /// Create an executor. `generation_timeout` bounds each backend call.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        pool: Arc<WorkerPool>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            pool,
            generation_timeout,
            active: RwLock::new(HashMap::new()),
            finished: RwLock::new(HashMap::new()),
            sink: None,
        }
    }

    /// Emit a task snapshot to `sink` on every status transition.
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get a reference to the worker pool.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Track a freshly submitted task so `get_task` can see it before it runs.
    pub async fn register(&self, task: &Task) {
        self.track(task).await;
    }

    /// Run `task` on `worker` and leave it COMPLETED or FAILED. A task that
    /// is already terminal is returned as is; a worker that cannot be claimed
    /// fails the task and is left untouched.
    pub async fn execute(&self, task: &mut Task, worker: &Worker) -> ExecutionResult {
        if task.status.is_terminal() {
            warn!(task_id = %task.id, status = %task.status, "Task already finished, not executing");
            return ExecutionResult {
                task_id: task.id,
                worker_id: worker.id,
                status: task.status,
                result: task.result.clone(),
                error: Some("task already finished".to_string()),
                quality_score: None,
                execution_time_ms: task.execution_time_ms.unwrap_or(0),
            };
        }

        let start = Instant::now();
        task.status = TaskStatus::InProgress;
        task.assigned_worker = Some(worker.id);
        self.track(task).await;
        info!(task_id = %task.id, worker_id = %worker.id, archetype = %worker.archetype, "Executing task");

        let claimed = self
            .pool
            .mark_status(worker.id, WorkerStatus::Working, Some(task.id))
            .await;
        let outcome = if claimed {
            Ok(self.run(task, worker).await)
        } else {
            Err(ForemanError::Executor(format!(
                "worker {} is not available for task {}",
                worker.id, task.id
            )))
        };
        let execution_time_ms = start.elapsed().as_millis() as u64;
        task.execution_time_ms = Some(execution_time_ms);
        task.completed_at = Some(Utc::now());

        let result = match outcome {
            Ok((response, quality)) => {
                task.status = TaskStatus::Completed;
                task.result = Some(response.clone());
                self.pool
                    .record_execution_time(worker.id, execution_time_ms)
                    .await;
                if !self
                    .pool
                    .record_completion(worker.id, task.id, Some(quality))
                    .await
                {
                    warn!(worker_id = %worker.id, task_id = %task.id, "Worker left the pool during execution");
                }
                info!(
                    task_id = %task.id,
                    worker_id = %worker.id,
                    quality,
                    fallback = response.is_fallback(),
                    duration_ms = execution_time_ms,
                    "Task completed"
                );
                ExecutionResult {
                    task_id: task.id,
                    worker_id: worker.id,
                    status: TaskStatus::Completed,
                    result: Some(response),
                    error: None,
                    quality_score: Some(quality),
                    execution_time_ms,
                }
            }
            // The worker was never claimed, so its state belongs to someone else.
            Err(e) => {
                let cause = e.to_string();
                task.status = TaskStatus::Failed;
                task.error_message = Some(cause.clone());
                warn!(task_id = %task.id, worker_id = %worker.id, error = %cause, "Task failed");
                ExecutionResult {
                    task_id: task.id,
                    worker_id: worker.id,
                    status: TaskStatus::Failed,
                    result: None,
                    error: Some(cause),
                    quality_score: None,
                    execution_time_ms,
                }
            }
        };

        self.finish(task, &result).await;
        result
    }

    /// Generate on a claimed worker. Never fails: backend trouble yields the
    /// fallback response.
    async fn run(&self, task: &Task, worker: &Worker) -> (WorkerResponse, f64) {
        let request = GenerationRequest {
            prompt: task.description.clone(),
            temperature: worker.generation.temperature,
            max_output_tokens: worker.generation.max_tokens,
            top_p: worker.generation.top_p,
            model: worker.generation.model.clone(),
        };

        let call = async {
            let text = self.backend.generate(&request).await?.into_text()?;
            Ok::<_, ForemanError>(format_response(worker, &text, task.complexity()))
        };
        let response = with_fallback(self.generation_timeout, call, || {
            fallback_response(worker, &task.description)
        })
        .await;

        // Re-read: another task may have updated the average meanwhile.
        let historical = self
            .pool
            .get(worker.id)
            .await
            .map_or(worker.average_quality_score, |w| w.average_quality_score);
        let quality = score_quality(worker.archetype, task.complexity(), historical);

        (response, quality)
    }

    async fn track(&self, task: &Task) {
        self.active.write().await.insert(task.id, task.clone());
        self.emit(task).await;
    }

    async fn finish(&self, task: &Task, result: &ExecutionResult) {
        self.active.write().await.remove(&task.id);
        self.finished
            .write()
            .await
            .insert(task.id, (task.clone(), result.clone()));
        self.emit(task).await;
    }

    /// Active tasks first, then finished ones.
    pub async fn get_task(&self, id: Uuid) -> Option<Task> {
        if let Some(task) = self.active.read().await.get(&id) {
            return Some(task.clone());
        }
        self.finished.read().await.get(&id).map(|(t, _)| t.clone())
    }

    /// Execution record of a finished task.
    pub async fn get_result(&self, id: Uuid) -> Option<ExecutionResult> {
        self.finished.read().await.get(&id).map(|(_, r)| r.clone())
    }

    /// Task counts by status. Averages cover COMPLETED tasks only.
    pub async fn stats(&self) -> ExecutorStats {
        let active = self.active.read().await;
        let finished = self.finished.read().await;

        let completed: Vec<&ExecutionResult> = finished
            .values()
            .filter(|(_, r)| r.status == TaskStatus::Completed)
            .map(|(_, r)| r)
            .collect();

        let mut stats = ExecutorStats {
            active_tasks: active.len(),
            completed_tasks: completed.len(),
            total_tasks: active.len() + finished.len(),
            ..ExecutorStats::default()
        };
        for status in active
            .values()
            .map(|t| t.status)
            .chain(finished.values().map(|(t, _)| t.status))
        {
            *stats.by_status.entry(status).or_default() += 1;
        }

        if !completed.is_empty() {
            let total_ms: u64 = completed.iter().map(|r| r.execution_time_ms).sum();
            stats.average_execution_time_ms = total_ms as f64 / completed.len() as f64;
        }
        let scores: Vec<f64> = completed.iter().filter_map(|r| r.quality_score).collect();
        if !scores.is_empty() {
            stats.average_quality_score = scores.iter().sum::<f64>() / scores.len() as f64;
        }
        stats
    }

    async fn emit(&self, task: &Task) {
        let Some(sink) = &self.sink else { return };
        let result = match serde_json::to_value(task) {
            Ok(record) => sink.put(RecordKind::Task, task.id, &record).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(task_id = %task.id, error = %e, "Failed to persist task");
        }
    }
}

/// Heuristic quality estimate in [0, 1]: 0.7 base, +0.1 for code and data
/// work, +0.1 for simple and -0.1 for complex tasks, then averaged with the
/// worker's history when it has one.
pub fn score_quality(archetype: Archetype, complexity: Option<Complexity>, historical: f64) -> f64 {
    let mut quality = 0.7;
    if matches!(archetype, Archetype::CodeGenerator | Archetype::DataAnalyst) {
        quality += 0.1;
    }
    match complexity {
        Some(Complexity::Simple) => quality += 0.1,
        Some(Complexity::Complex) => quality -= 0.1,
        _ => {}
    }
    if historical > 0.0 {
        quality = (quality + historical) / 2.0;
    }
    quality.clamp(0.0, 1.0)
}

fn base_metadata(worker: &Worker, text: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("worker_id".into(), json!(worker.id));
    metadata.insert("archetype".into(), json!(worker.archetype));
    metadata.insert("word_count".into(), json!(text.split_whitespace().count()));
    metadata.insert("character_count".into(), json!(text.chars().count()));
    metadata
}

/// Wrap generated text with counts and archetype-specific placeholder metadata.
pub fn format_response(worker: &Worker, text: &str, complexity: Option<Complexity>) -> WorkerResponse {
    let mut metadata = base_metadata(worker, text);
    match worker.archetype {
        Archetype::CodeGenerator => {
            metadata.insert("language".into(), json!(guess_language(text)));
            metadata.insert("lines_of_code".into(), json!(text.lines().count()));
            metadata.insert(
                "complexity".into(),
                json!(complexity.unwrap_or(Complexity::Medium)),
            );
        }
        Archetype::TextProcessor => {
            metadata.insert("processing_method".into(), json!("generation"));
            metadata.insert("readability_score".into(), json!(0.8));
        }
        Archetype::CreativeWriter => {
            metadata.insert("genre".into(), json!("creative"));
            metadata.insert("creativity_score".into(), json!(0.8));
        }
        Archetype::DataAnalyst => {
            metadata.insert("analysis_type".into(), json!("generated_insights"));
            metadata.insert("confidence".into(), json!(0.85));
        }
        _ => {}
    }
    WorkerResponse {
        archetype: worker.archetype,
        result: text.to_string(),
        metadata,
    }
}

/// Deterministic templated answer used when generation fails.
pub fn fallback_response(worker: &Worker, description: &str) -> WorkerResponse {
    let text = match worker.archetype {
        Archetype::TextProcessor => format!("Processed text for task: {description}"),
        Archetype::CodeGenerator => format!(
            "# Code for task: {description}\n\ndef solve_task():\n    # Implementation\n    return 'result'"
        ),
        Archetype::DataAnalyst => format!("Data analysis for task: {description}"),
        Archetype::CreativeWriter => format!("Creative piece on the theme: {description}"),
        Archetype::Researcher => format!("Research on the topic: {description}"),
        Archetype::Translator => format!("Translation for task: {description}"),
        Archetype::Summarizer => format!("Summary: {description}"),
        Archetype::General => format!("Answer to the task: {description}"),
    };
    let mut metadata = base_metadata(worker, &text);
    metadata.insert("fallback_mode".into(), Value::Bool(true));
    WorkerResponse {
        archetype: worker.archetype,
        result: text,
        metadata,
    }
}

fn guess_language(code: &str) -> &'static str {
    if code.contains("fn ") && (code.contains("let ") || code.contains("->")) {
        "rust"
    } else if code.contains("def ") || code.contains("import ") {
        "python"
    } else if code.contains("function ") || code.contains("const ") {
        "javascript"
    } else if code.contains("#include") {
        "c"
    } else {
        "unknown"
    }
}
