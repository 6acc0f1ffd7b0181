//! Tabular Data Preparation Library
//!
//! A configurable, multi-stage pipeline that turns a raw in-memory table
//! into a cleaned, typed, encoded and scaled table, built on Polars.
//!
//! # Overview
//!
//! A run always performs:
//!
//! - **Cleaning**: column name normalization, whitespace trimming, removal of
//!   columns with no values
//! - **Type Coercion**: text columns that hold only dates or numbers become
//!   datetime or numeric columns
//!
//! and then, as configured:
//!
//! - **Duplicates**: keep the first, the last, or no copy of repeated rows
//! - **Missing Values**: drop rows or fill with mean, median, most frequent
//!   or a neutral constant
//! - **Outliers**: clip to IQR or z-score bounds
//! - **Encoding**: one-hot or label encoding of categorical columns
//! - **Scaling**: standard, robust or min-max scaling
//! - **Selection**: drop constant and highly correlated columns
//! - **Reduction**: replace numeric columns by principal components
//!
//! A stage that fails internally keeps its input and records an error
//! diagnostic; the run continues. Only a catastrophic failure aborts, and
//! it carries the last good table with it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabprep::{Pipeline, PipelineConfig, ScalingStrategy};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let config = PipelineConfig::builder()
//!     .scaling(ScalingStrategy::Robust)
//!     .select_features(true)
//!     .build()?;
//!
//! let outcome = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//!
//! println!("{} rows left", outcome.summary.rows_after);
//! for event in &outcome.diagnostics {
//!     println!("{event}");
//! }
//! ```
//!
//! # Diagnostics
//!
//! Every stage reports through a [`Diagnostics`] handle. Events are kept in
//! the run outcome and forwarded to a [`DiagnosticsSink`]: the default
//! discards them, [`TracingSink`] logs them, and [`SharedDiagnosticLog`]
//! collects events of concurrent runs tagged with their run id.
//!
//! # Failures
//!
//! ```rust,ignore
//! match pipeline.run(df) {
//!     Ok(outcome) => println!("Done: {:?}", outcome.table.shape()),
//!     Err(PipelineError::Catastrophic { stage, partial, .. }) => {
//!         println!("{stage} failed, last good table: {:?}", partial.last_table.shape());
//!     }
//!     Err(e) => println!("Error: {e}"),
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{BasicCleaner, DuplicateResolver, TypeCoercer, count_duplicate_rows};
pub use config::{
    ConfigValidationError, DuplicateStrategy, EncodingStrategy, MissingValueStrategy,
    OutlierStrategy, PipelineConfig, PipelineConfigBuilder, ScalingStrategy,
};
pub use error::{PartialRun, PipelineError, Result, ResultExt, StageError, StageResult};
pub use features::{
    CategoricalEncoder, DimensionalityReducer, FeatureScaler, FeatureSelector, PrincipalComponents,
};
pub use imputers::MissingValueImputer;
pub use pipeline::{
    ClosureProgressReporter, ClosureSink, DiagnosticEvent, Diagnostics, DiagnosticsSink, NullSink,
    OutlierHandler, Pipeline, PipelineBuilder, PipelineStage, PipelineState, ProgressReporter,
    ProgressUpdate, RunLogSink, Severity, SharedDiagnosticLog, TaggedEvent, TracingSink,
};
pub use profiler::{ColumnKind, ColumnKinds, DataProfiler, classify};
pub use quality::DataValidator;
pub use reporting::{ReportGenerator, RunReport};
pub use types::{
    ChiSquareTest, ColumnSummary, CorrelationPair, FeatureImportance, Insight, LabelEncoding,
    NumericSummary, PipelineOutcome, RunSummary, StageRecord, StageStatus, TableSummary,
    ValidationIssue, ValidationIssueKind,
};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype};
