use chrono::{DateTime, Utc};
use foreman_core::{Archetype, Complexity, Priority, TaskCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle of a task: `Pending -> InProgress -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet picked up.
    Pending,
    /// Running on a worker.
    InProgress,
    /// Finished with a result (possibly a fallback one).
    Completed,
    /// Finished with an error message.
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` are terminal; nothing moves a task out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Structured classification of a task, computed once before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// Detected task category.
    pub category: TaskCategory,
    /// Assessed complexity.
    pub complexity: Complexity,
    /// Base skills plus the category's skills.
    pub required_skills: Vec<String>,
    /// Estimated duration in minutes.
    pub estimated_minutes: f64,
    /// Archetype best suited to the category.
    pub suggested_archetype: Archetype,
    /// Ordered subtasks; the description itself when not decomposed.
    pub subtasks: Vec<String>,
    /// Resource tags such as `file_access` or `web_access`.
    pub resource_requirements: Vec<String>,
    /// Criteria the result is judged by.
    pub success_criteria: Vec<String>,
    /// Priority the task should run at given its complexity.
    pub suggested_priority: Priority,
}

/// Skills every analysis carries regardless of category.
pub const BASE_SKILLS: [&str; 2] = ["general_reasoning", "text_understanding"];

/// Criterion every analysis carries regardless of category.
pub const BASE_CRITERION: &str = "task_completion";

impl TaskAnalysis {
    /// Conservative analysis used when the real one cannot be produced.
    pub fn conservative(description: &str, priority: Priority) -> Self {
        Self {
            category: TaskCategory::General,
            complexity: Complexity::Medium,
            required_skills: BASE_SKILLS.iter().map(|s| (*s).to_string()).collect(),
            estimated_minutes: 5.0,
            suggested_archetype: Archetype::General,
            subtasks: vec![description.to_string()],
            resource_requirements: Vec::new(),
            success_criteria: vec![BASE_CRITERION.to_string()],
            suggested_priority: priority,
        }
    }
}

/// Opaque structured output of one execution, tagged with the worker's
/// archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Archetype of the worker that produced it.
    #[serde(rename = "type")]
    pub archetype: Archetype,
    /// Generated (or templated) text.
    pub result: String,
    /// Counts and archetype-specific placeholders.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl WorkerResponse {
    /// Whether the response came from the per-archetype template instead of
    /// the generation backend.
    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get("fallback_mode")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// A task submitted to the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: Uuid,
    /// Free-text description; also the generation prompt.
    pub description: String,
    /// Current priority.
    pub priority: Priority,
    /// Preset or detected category.
    pub category: TaskCategory,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Worker the task ran on.
    #[serde(default)]
    pub assigned_worker: Option<Uuid>,
    /// Response once completed.
    #[serde(default)]
    pub result: Option<WorkerResponse>,
    /// Cause once failed.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Wall-clock duration of the execution.
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    /// Analysis attached before execution.
    #[serde(default)]
    pub analysis: Option<TaskAnalysis>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Time the task reached a terminal status.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task in the `general` category.
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            priority,
            category: TaskCategory::General,
            status: TaskStatus::Pending,
            assigned_worker: None,
            result: None,
            error_message: None,
            execution_time_ms: None,
            analysis: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Set the category.
    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    /// Attach an analysis.
    pub fn with_analysis(mut self, analysis: TaskAnalysis) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Complexity from the attached analysis, if any.
    pub fn complexity(&self) -> Option<Complexity> {
        self.analysis.as_ref().map(|a| a.complexity)
    }
}

/// Worker lifecycle. `Working` and `Busy` both mean a task is in flight;
/// `Busy` marks a worker reserved for a task that has not started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Free to take a task.
    Idle,
    /// Executing a task.
    Working,
    /// Reserved for a task.
    Busy,
    /// Explicitly stopped; never reused.
    Stopped,
}

impl WorkerStatus {
    /// Anything but `Stopped`.
    pub fn is_active(&self) -> bool {
        !matches!(self, WorkerStatus::Stopped)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Working => write!(f, "working"),
            WorkerStatus::Busy => write!(f, "busy"),
            WorkerStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// A named proficiency in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name, e.g. `code_generation`.
    pub name: String,
    /// Proficiency in [0, 1].
    pub level: f64,
    /// Human-readable description.
    pub description: String,
}

impl Capability {
    /// Create a capability.
    pub fn new(name: impl Into<String>, level: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            description: description.into(),
        }
    }
}

/// Sampling parameters a worker passes to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Preferred model; `None` lets the provider use its configured one.
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature in [0, 2].
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Nucleus sampling cutoff in (0, 1].
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 0.9,
        }
    }
}

/// Everything needed to register a worker of a given archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Display name.
    pub name: String,
    /// Worker specialization.
    pub archetype: Archetype,
    /// Fixed capability set of the archetype.
    pub capabilities: Vec<Capability>,
    /// Operating principles of the archetype.
    pub instructions: Vec<String>,
    /// Generation profile.
    pub generation: GenerationParams,
}

/// A live worker in the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker ID.
    pub id: Uuid,
    /// Display name, suffixed with a pool sequence number.
    pub name: String,
    /// Worker specialization.
    pub archetype: Archetype,
    /// Capabilities copied from the spec.
    pub capabilities: Vec<Capability>,
    /// Operating principles copied from the spec.
    pub instructions: Vec<String>,
    /// Generation profile copied from the spec.
    pub generation: GenerationParams,
    /// Lifecycle state.
    pub status: WorkerStatus,
    /// Task currently claimed, if any.
    #[serde(default)]
    pub current_task: Option<Uuid>,
    /// Number of completed tasks.
    pub tasks_completed: u32,
    /// Number of failed tasks.
    pub tasks_failed: u32,
    /// Sum of execution times of claimed tasks.
    pub total_execution_time_ms: u64,
    /// Running mean `(avg * (n - 1) + q) / n` with `n` the completed count;
    /// 0 until the first scored completion.
    pub average_quality_score: f64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last status change or counter update.
    pub last_activity: DateTime<Utc>,
    /// IDs of completed tasks, oldest first.
    pub task_history: Vec<Uuid>,
}

impl Worker {
    /// Create an idle worker from a spec.
    pub fn from_spec(spec: WorkerSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: spec.name,
            archetype: spec.archetype,
            capabilities: spec.capabilities,
            instructions: spec.instructions,
            generation: spec.generation,
            status: WorkerStatus::Idle,
            current_task: None,
            tasks_completed: 0,
            tasks_failed: 0,
            total_execution_time_ms: 0,
            average_quality_score: 0.0,
            created_at: now,
            last_activity: now,
            task_history: Vec::new(),
        }
    }

    /// Eviction ranking metric.
    pub fn efficiency(&self) -> f64 {
        f64::from(self.tasks_completed) * self.average_quality_score
    }

    /// `completed / (completed + failed)`, 0 with no tasks.
    pub fn success_rate(&self) -> f64 {
        let total = self.tasks_completed + self.tasks_failed;
        if total == 0 {
            0.0
        } else {
            f64::from(self.tasks_completed) / f64::from(total)
        }
    }

    /// Level of the named capability, if the worker has it.
    pub fn capability_level(&self, name: &str) -> Option<f64> {
        self.capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.level)
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Executed task.
    pub task_id: Uuid,
    /// Worker it ran on.
    pub worker_id: Uuid,
    /// Terminal status.
    pub status: TaskStatus,
    /// Response when completed.
    #[serde(default)]
    pub result: Option<WorkerResponse>,
    /// Cause when failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Heuristic quality estimate when completed.
    #[serde(default)]
    pub quality_score: Option<f64>,
    /// Measured wall-clock time.
    pub execution_time_ms: u64,
}

/// Aggregate view of the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Workers in the pool, stopped ones included.
    pub total_workers: usize,
    /// Workers not stopped.
    pub active_workers: usize,
    /// Worker count per archetype.
    pub by_archetype: BTreeMap<Archetype, usize>,
    /// Worker count per status.
    pub by_status: BTreeMap<WorkerStatus, usize>,
    /// Completions summed over current workers.
    pub total_completed: u64,
    /// Failures summed over current workers.
    pub total_failed: u64,
    /// Pool-wide `completed / (completed + failed)`.
    pub success_rate: f64,
    /// Mean of per-worker quality averages.
    pub average_quality_score: f64,
}

/// Per-worker performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPerformance {
    /// Reported worker.
    pub worker_id: Uuid,
    /// Display name.
    pub name: String,
    /// Worker specialization.
    pub archetype: Archetype,
    /// Current status.
    pub status: WorkerStatus,
    /// Completed tasks.
    pub tasks_completed: u32,
    /// Failed tasks.
    pub tasks_failed: u32,
    /// `completed / (completed + failed)`.
    pub success_rate: f64,
    /// Running quality mean.
    pub average_quality_score: f64,
    /// Sum of execution times.
    pub total_execution_time_ms: u64,
    /// Total execution time per completed task.
    pub average_execution_time_ms: f64,
    /// Last status change or counter update.
    pub last_activity: DateTime<Utc>,
}

/// Aggregate view of the executor's tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStats {
    /// Tasks pending or in progress.
    pub active_tasks: usize,
    /// Tasks that finished COMPLETED.
    pub completed_tasks: usize,
    /// Active plus finished tasks.
    pub total_tasks: usize,
    /// Task count per status.
    pub by_status: BTreeMap<TaskStatus, usize>,
    /// Mean execution time of completed tasks.
    pub average_execution_time_ms: f64,
    /// Mean quality score of completed tasks.
    pub average_quality_score: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn spec() -> WorkerSpec {
        WorkerSpec {
            name: "Code Generator".into(),
            archetype: Archetype::CodeGenerator,
            capabilities: vec![Capability::new("programming", 0.9, "Writes code")],
            instructions: vec!["Write clean code".into()],
            generation: GenerationParams::default(),
        }
    }

    #[test]
    fn test_task_creation() {
        let task = Task::new("Sort a list", Priority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.category, TaskCategory::General);
        assert!(task.assigned_worker.is_none());
        assert!(task.complexity().is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_worker_from_spec_starts_idle() {
        let worker = Worker::from_spec(spec());
        assert_eq!(worker.status, WorkerStatus::Idle);
        assert_eq!(worker.tasks_completed, 0);
        assert_eq!(worker.average_quality_score, 0.0);
        assert_eq!(worker.capability_level("programming"), Some(0.9));
        assert_eq!(worker.created_at, worker.last_activity);
    }

    #[test]
    fn test_efficiency_and_success_rate() {
        let mut worker = Worker::from_spec(spec());
        assert_eq!(worker.success_rate(), 0.0);
        worker.tasks_completed = 3;
        worker.tasks_failed = 1;
        worker.average_quality_score = 0.5;
        assert!((worker.efficiency() - 1.5).abs() < f64::EPSILON);
        assert!((worker.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(serde_json::to_string(&WorkerStatus::Busy).unwrap(), "\"busy\"");
    }

    #[test]
    fn test_response_fallback_flag() {
        let mut metadata = serde_json::Map::new();
        let response = WorkerResponse {
            archetype: Archetype::General,
            result: "x".into(),
            metadata: metadata.clone(),
        };
        assert!(!response.is_fallback());

        metadata.insert("fallback_mode".into(), serde_json::Value::Bool(true));
        let response = WorkerResponse { metadata, ..response };
        assert!(response.is_fallback());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "general");
    }
}
