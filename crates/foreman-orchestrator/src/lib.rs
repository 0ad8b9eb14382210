//! Task routing and worker-pool management.
//!
//! A submitted task is classified by the [`TaskAnalyzer`], matched to a
//! specialized worker built by the [`WorkerProfileFactory`] and kept in the
//! [`WorkerPool`], then run against a generation backend by the
//! [`TaskExecutor`]. The [`Orchestrator`] ties the three steps together and
//! bounds how many submissions run at once.
//!
//! Every component degrades instead of failing: analysis falls back to a
//! conservative result, worker construction to a general-purpose worker, and
//! generation to a templated answer.
//!
//! # Main types
//!
//! - [`Orchestrator`]: submission facade (`analyze -> acquire -> execute`).
//! - [`TaskAnalyzer`]: keyword and length heuristics producing a [`TaskAnalysis`].
//! - [`WorkerProfileFactory`]: archetype to capabilities, principles and generation parameters.
//! - [`WorkerPool`]: worker registry with statistics, idle cleanup and eviction.
//! - [`TaskExecutor`]: one task on one worker, with quality scoring.

/// Task classification, complexity and decomposition.
pub mod analyzer;
/// Submission facade.
pub mod engine;
/// Task execution against the generation backend.
pub mod executor;
/// Timeout-plus-fallback combinator for best-effort calls.
pub mod fallback;
/// Worker registry and lifecycle.
pub mod pool;
/// Archetype profiles and worker specs.
pub mod profiles;
/// Shared task and worker types.
pub mod types;

pub use analyzer::{AnalyzerConfig, GenerationDecomposer, TaskAnalyzer, TaskDecomposer};
pub use engine::{Orchestrator, SubmissionOutcome, TaskRequest};
pub use executor::{ExecutorConfig, TaskExecutor};
pub use fallback::with_fallback;
pub use pool::{PoolConfig, WorkerPool};
pub use profiles::{ProfileOverride, WorkerProfileFactory};
pub use types::{
    Capability, ExecutionResult, ExecutorStats, GenerationParams, PoolStats, Task, TaskAnalysis,
    TaskStatus, Worker, WorkerPerformance, WorkerResponse, WorkerSpec, WorkerStatus,
};
