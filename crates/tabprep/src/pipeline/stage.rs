//! Pipeline stages and the run state machine.
//!
//! A run moves `Idle -> Running(Cleaning) -> ... -> Done`. Disabled stages
//! are skipped without a transition. `Failed` is entered only when an
//! error escapes a stage guard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of the preparation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Name normalization, value trimming, all-missing column removal
    Cleaning,
    /// Duplicate row resolution
    Duplicates,
    /// Missing-value imputation
    MissingValues,
    /// Text columns converted to datetime or numeric
    TypeCoercion,
    /// Numeric outlier clipping
    Outliers,
    /// Categorical encoding
    Encoding,
    /// Numeric feature scaling
    Scaling,
    /// Constant and correlated column pruning
    Selection,
    /// Principal component analysis
    Reduction,
}

impl PipelineStage {
    /// Fixed execution order.
    pub const ORDER: [PipelineStage; 9] = [
        PipelineStage::Cleaning,
        PipelineStage::Duplicates,
        PipelineStage::MissingValues,
        PipelineStage::TypeCoercion,
        PipelineStage::Outliers,
        PipelineStage::Encoding,
        PipelineStage::Scaling,
        PipelineStage::Selection,
        PipelineStage::Reduction,
    ];

    /// Name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Duplicates => "duplicates",
            Self::MissingValues => "missing_values",
            Self::TypeCoercion => "type_coercion",
            Self::Outliers => "outliers",
            Self::Encoding => "encoding",
            Self::Scaling => "scaling",
            Self::Selection => "selection",
            Self::Reduction => "reduction",
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cleaning => "Cleaning Data",
            Self::Duplicates => "Removing Duplicates",
            Self::MissingValues => "Imputing Values",
            Self::TypeCoercion => "Converting Types",
            Self::Outliers => "Handling Outliers",
            Self::Encoding => "Encoding Categoricals",
            Self::Scaling => "Scaling Features",
            Self::Selection => "Selecting Features",
            Self::Reduction => "Reducing Dimensions",
        }
    }

    /// Mandatory stages run regardless of configuration.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::Cleaning | Self::TypeCoercion)
    }

    /// Typical share of the overall run spent in this stage.
    ///
    /// Weights sum to 1.0 over [`ORDER`](Self::ORDER).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Cleaning => 0.10,
            Self::Duplicates => 0.05,
            Self::MissingValues => 0.15,
            Self::TypeCoercion => 0.15,
            Self::Outliers => 0.10,
            Self::Encoding => 0.10,
            Self::Scaling => 0.10,
            Self::Selection => 0.10,
            Self::Reduction => 0.15,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        Self::ORDER
            .iter()
            .take_while(|stage| *stage != self)
            .map(|stage| stage.weight())
            .sum()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started
    #[default]
    Idle,
    /// Executing a stage
    Running(PipelineStage),
    /// Finished; the outcome carries the final table
    Done,
    /// Aborted by a catastrophic error
    Failed,
}

impl PipelineState {
    /// Whether the run has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Move to `next`, rejecting transitions the state machine does not
    /// allow.
    pub fn advance(self, next: PipelineState) -> Option<PipelineState> {
        let allowed = match (self, next) {
            (Self::Idle, Self::Running(PipelineStage::Cleaning)) => true,
            (Self::Running(current), Self::Running(stage)) => stage > current,
            (Self::Running(_), Self::Done | Self::Failed) => true,
            _ => false,
        };
        allowed.then_some(next)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running(stage) => write!(f, "running {stage}"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
