use crate::pipeline::{DiagnosticEvent, PipelineStage, PipelineState, Severity};
use crate::profiler::ColumnKind;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

// ============================================================================
// Label Encoding Lookup
// ============================================================================

/// Integer codes assigned to the values of one label-encoded column.
///
/// Code `i` stands for `classes[i]`; classes are in sorted text order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoding {
    /// Source column.
    pub column: String,
    /// Column holding the codes.
    pub encoded_column: String,
    /// Distinct values, indexed by code.
    pub classes: Vec<String>,
}

impl LabelEncoding {
    /// Value a code stands for.
    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
            .map(String::as_str)
    }

    /// Code assigned to a value.
    pub fn encode(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .map(|idx| idx as i64)
    }
}

// ============================================================================
// Run Summary Types
// ============================================================================

/// What happened to a stage during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage produced a new table.
    Applied,
    /// The stage failed internally; its input was passed on.
    FellBack,
    /// The stage failed catastrophically and the run stopped.
    Aborted,
}

/// Shape of the table around one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub duration_ms: u64,
}

/// Human-readable summary of what a run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// Executed stages in order. Disabled stages are absent.
    pub stages: Vec<StageRecord>,
    pub warnings: usize,
    pub errors: usize,
}

impl RunSummary {
    /// Number of rows removed by the run.
    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    /// Calculate the percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f32 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_removed() as f32 / self.rows_before as f32) * 100.0
        }
    }

    /// Stages whose output fell back to their input.
    pub fn fallen_back(&self) -> Vec<PipelineStage> {
        self.stages
            .iter()
            .filter(|record| record.status == StageStatus::FellBack)
            .map(|record| record.stage)
            .collect()
    }
}

/// Result of a run that reached `Done`.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Id tagging this run's events in a shared diagnostic log.
    pub run_id: u64,
    /// The prepared table.
    pub table: DataFrame,
    /// Terminal state, always [`PipelineState::Done`].
    pub state: PipelineState,
    /// Every diagnostic of the run, in emission order.
    pub diagnostics: Vec<DiagnosticEvent>,
    /// Lookups for label-encoded columns.
    pub encodings: Vec<LabelEncoding>,
    pub summary: RunSummary,
}

impl PipelineOutcome {
    /// Diagnostics of one severity.
    pub fn diagnostics_with(&self, severity: Severity) -> impl Iterator<Item = &DiagnosticEvent> {
        self.diagnostics
            .iter()
            .filter(move |event| event.severity == severity)
    }

    /// Label encoding produced for `column`, if any.
    pub fn encoding_for(&self, column: &str) -> Option<&LabelEncoding> {
        self.encodings.iter().find(|encoding| encoding.column == column)
    }
}

// ============================================================================
// Profiling Types
// ============================================================================

/// Descriptive statistics of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub mean: f64,
    /// Sample standard deviation, absent below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

/// Profile of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub kind: ColumnKind,
    /// Present (non-missing) values.
    pub count: usize,
    pub missing: usize,
    pub missing_percentage: f64,
    pub distinct: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_frequent: Option<String>,
}

/// Correlation between two numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

/// Chi-square goodness-of-fit of a categorical column's level counts
/// against equally frequent levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareTest {
    pub column: String,
    pub statistic: f64,
    pub p_value: f64,
    /// Number of levels minus one.
    pub degrees_of_freedom: usize,
}

/// Correlation of a numeric column with the target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub column: String,
    pub coefficient: f64,
}

/// Noteworthy property of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Insight {
    /// Column with a large share of missing values.
    HighMissing { column: String, percentage: f64 },
    /// Pair of strongly correlated numeric columns.
    StrongCorrelation {
        left: String,
        right: String,
        coefficient: f64,
    },
    /// Columns most correlated with the target, best first.
    TopFeatures {
        target: String,
        features: Vec<String>,
    },
}

impl Insight {
    pub fn describe(&self) -> String {
        match self {
            Self::HighMissing { column, percentage } => format!(
                "Column '{column}' has {percentage:.2}% missing values. Consider imputation or removal."
            ),
            Self::StrongCorrelation {
                left,
                right,
                coefficient,
            } => format!(
                "Strong correlation ({coefficient:.2}) between '{left}' and '{right}'."
            ),
            Self::TopFeatures { target, features } => format!(
                "The top {} most important features for '{}' are: {}.",
                features.len(),
                target,
                features.join(", ")
            ),
        }
    }
}

/// Profile of a whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
    pub duplicate_rows: usize,
    pub column_summaries: Vec<ColumnSummary>,
    /// Every numeric pair with a defined correlation, upper triangle.
    pub correlations: Vec<CorrelationPair>,
    /// One test per categorical column with at least two levels.
    pub chi_square: Vec<ChiSquareTest>,
    /// Column the importances are measured against, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Numeric columns by descending correlation with the target.
    pub feature_importance: Vec<FeatureImportance>,
    pub insights: Vec<Insight>,
}

impl TableSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.column_summaries.iter().find(|c| c.name == name)
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// Kind of problem found by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssueKind {
    NegativeValues,
    InvalidDates,
}

/// A column that failed a validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub column: String,
    pub kind: ValidationIssueKind,
    /// Number of offending cells.
    pub count: usize,
}

impl ValidationIssue {
    pub fn describe(&self) -> String {
        match self.kind {
            ValidationIssueKind::NegativeValues => format!(
                "Negative values found in column: {} ({} rows)",
                self.column, self.count
            ),
            ValidationIssueKind::InvalidDates => format!(
                "Invalid date format found in column: {} ({} rows)",
                self.column, self.count
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
