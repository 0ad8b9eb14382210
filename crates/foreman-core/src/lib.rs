//! Core types and error definitions for Foreman.
//!
//! This crate provides the foundational types shared across all Foreman crates:
//! the unified error enum and the small vocabulary used to describe tasks and
//! workers (priority, category, complexity, worker archetype).
//!
//! # Main types
//!
//! - [`ForemanError`]: Unified error enum for all Foreman subsystems.
//! - [`ForemanResult`]: Convenience alias for `Result<T, ForemanError>`.
//! - [`Priority`], [`TaskCategory`], [`Complexity`]: task classification.
//! - [`Archetype`]: the closed set of worker specializations.

/// Task and worker classification enums.
pub mod taxonomy;

pub use taxonomy::{Archetype, Complexity, Priority, TaskCategory};

// --- Error types ---

/// Top-level error type for Foreman.
///
/// Each variant corresponds to a subsystem that can produce errors. Most of
/// them are recovered locally by the component that raised them; only
/// executor-level failures reach a task as its error message.
#[derive(Debug, thiserror::Error)]
pub enum ForemanError {
    /// Task analysis could not produce a structured result.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A worker could not be built or looked up.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The generation backend reported a failure.
    #[error("Generation error: {0}")]
    Generation(String),

    /// An error from an outbound HTTP request (e.g. a generation API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An external call exceeded its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Something unexpected happened between task state transitions.
    #[error("Executor error: {0}")]
    Executor(String),

    /// An error from the persistence collaborator.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An admission bound (pool size, concurrency) was hit.
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ForemanError`].
pub type ForemanResult<T> = Result<T, ForemanError>;
