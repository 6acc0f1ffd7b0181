//! Progress reporting for the preparation pipeline.
//!
//! The orchestrator emits one update when a stage starts, one when it
//! finishes, and a terminal update when the run is done or failed.
//! Runs cannot be cancelled midway.
//!
//! # Example
//!
//! ```rust,ignore
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//! ```

use super::stage::{PipelineStage, PipelineState};
use serde::{Deserialize, Serialize};

/// Progress update emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// State of the run when the update was emitted
    pub state: PipelineState,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Rows in the table at the time of the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,

    /// Columns in the table at the time of the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a progress update for a running stage.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            state: PipelineState::Running(stage),
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            rows: None,
            columns: None,
        }
    }

    /// Attach the current table shape.
    pub fn with_shape(mut self, (rows, columns): (usize, usize)) -> Self {
        self.rows = Some(rows);
        self.columns = Some(columns);
        self
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            state: PipelineState::Done,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
            rows: None,
            columns: None,
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: PipelineState::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            rows: None,
            columns: None,
        }
    }
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be `Send + Sync` so a pipeline holding one can be
/// moved to a worker thread.
pub trait ProgressReporter: Send + Sync {
    /// Called at stage boundaries. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
