//! Error types for the preparation pipeline.
//!
//! Two layers are kept apart:
//!
//! - [`PipelineError`] is fatal. It aborts a run (configuration errors abort
//!   before any stage executes, catastrophic errors move the run to
//!   [`PipelineState::Failed`](crate::pipeline::PipelineState::Failed)).
//! - [`StageError`] is the outcome of a single stage. Its `Internal` variant
//!   is absorbed by the orchestrator: logged as an error diagnostic, and the
//!   stage output falls back to the stage input. Only `Fatal` escapes.
//!
//! Errors are serializable as `{code, message}` so a UI layer can display
//! them without knowing the variants.

use crate::config::ConfigValidationError;
use crate::pipeline::{DiagnosticEvent, PipelineStage};
use polars::prelude::DataFrame;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// State preserved when a run fails, so the caller can fall back to the
/// last table that was successfully produced.
#[derive(Debug, Clone)]
pub struct PartialRun {
    /// Output of the last stage that completed (or the input table).
    pub last_table: DataFrame,
    /// Every diagnostic emitted before the failure, in order.
    pub diagnostics: Vec<DiagnosticEvent>,
}

/// Fatal pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration provided. Raised before any stage runs.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// An error escaped a stage guard; the run is in the `Failed` state.
    #[error("Pipeline failed during {stage}: {reason}")]
    Catastrophic {
        stage: PipelineStage,
        reason: String,
        partial: Box<PartialRun>,
    },

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Catastrophic { .. } => "PIPELINE_FAILED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the run was rejected before any stage executed.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }

    /// The state preserved by a catastrophic failure, if any.
    pub fn partial(&self) -> Option<&PartialRun> {
        match self {
            Self::Catastrophic { partial, .. } => Some(partial),
            Self::WithContext { source, .. } => source.partial(),
            _ => None,
        }
    }

    /// Consume the error and recover the last good table, if any.
    pub fn into_partial(self) -> Option<PartialRun> {
        match self {
            Self::Catastrophic { partial, .. } => Some(*partial),
            Self::WithContext { source, .. } => source.into_partial(),
            _ => None,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for fatal pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome of a single stage that did not produce a table.
#[derive(Error, Debug)]
pub enum StageError {
    /// Stage-local failure. The orchestrator logs it and keeps the input.
    #[error("{0}")]
    Internal(String),

    /// Failure that no stage guard may absorb.
    #[error(transparent)]
    Fatal(#[from] PipelineError),
}

impl StageError {
    /// Build a stage-local failure from any message.
    pub fn internal(message: impl Into<String>) -> Self {
        StageError::Internal(message.into())
    }

    /// Whether the orchestrator may recover from this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<polars::error::PolarsError> for StageError {
    fn from(err: polars::error::PolarsError) -> Self {
        StageError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        StageError::Internal(format!("{err:#}"))
    }
}

/// Result of running one stage: the new table, or why it was not produced.
pub type StageResult = std::result::Result<DataFrame, StageError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
