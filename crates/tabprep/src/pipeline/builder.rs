//! Main preparation pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating the stage sequence.

use crate::cleaner::{BasicCleaner, DuplicateResolver, TypeCoercer};
use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PartialRun, PipelineError, Result, StageError, StageResult};
use crate::features::{CategoricalEncoder, DimensionalityReducer, FeatureScaler, FeatureSelector};
use crate::imputers::MissingValueImputer;
use crate::pipeline::diagnostics::{
    Diagnostics, DiagnosticsSink, NullSink, Severity, SharedDiagnosticLog,
};
use crate::pipeline::outliers::OutlierHandler;
use crate::pipeline::progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate};
use crate::pipeline::stage::{PipelineStage, PipelineState};
use crate::types::{LabelEncoding, PipelineOutcome, RunSummary, StageRecord, StageStatus};
use polars::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Where a pipeline sends the diagnostics of its runs.
#[derive(Clone)]
enum SinkTarget {
    Fixed(Arc<dyn DiagnosticsSink>),
    Shared(SharedDiagnosticLog),
}

impl SinkTarget {
    fn for_run(&self, run_id: u64) -> Arc<dyn DiagnosticsSink> {
        match self {
            Self::Fixed(sink) => Arc::clone(sink),
            Self::Shared(log) => Arc::new(log.for_run(run_id)),
        }
    }
}

/// The main preparation pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::{Pipeline, PipelineConfig, ScalingStrategy};
///
/// let outcome = Pipeline::builder()
///     .config(PipelineConfig::builder().scaling(ScalingStrategy::Robust).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(dataframe)?;
///
/// println!("{} diagnostics", outcome.diagnostics.len());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    sink: SinkTarget,
}

// Runs may be started from worker threads sharing one pipeline.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

/// Mutable state threaded through one run.
struct RunContext {
    run_id: u64,
    state: PipelineState,
    diagnostics: Diagnostics,
    encodings: Vec<LabelEncoding>,
    records: Vec<StageRecord>,
}

impl RunContext {
    fn transition(&mut self, next: PipelineState) {
        self.state = self.state.advance(next).unwrap_or_else(|| {
            warn!("Unexpected state transition {} -> {}", self.state, next);
            next
        });
    }
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every enabled stage over `df`.
    ///
    /// Stage-local failures are logged and the stage's input is passed on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Catastrophic`] when a stage fails in a way
    /// no guard absorbs. The error carries the last good table and every
    /// diagnostic emitted so far.
    pub fn run(&self, df: DataFrame) -> Result<PipelineOutcome> {
        self.execute_with(df, |stage, table, diagnostics, encodings| {
            self.run_stage(stage, table, diagnostics, encodings)
        })
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Drive the state machine, delegating each stage to `runner`.
    fn execute_with<F>(&self, df: DataFrame, mut runner: F) -> Result<PipelineOutcome>
    where
        F: FnMut(PipelineStage, &DataFrame, &mut Diagnostics, &mut Vec<LabelEncoding>) -> StageResult,
    {
        let start_time = Instant::now();
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let mut ctx = RunContext {
            run_id,
            state: PipelineState::Idle,
            diagnostics: Diagnostics::new(self.sink.for_run(run_id)),
            encodings: Vec::new(),
            records: Vec::new(),
        };

        info!(run_id, "Starting pipeline on {} rows x {} columns", df.height(), df.width());
        let (rows_before, columns_before) = (df.height(), df.width());
        let mut table = df;

        for stage in self.config.enabled_stages() {
            ctx.transition(PipelineState::Running(stage));
            ctx.diagnostics.begin_stage(stage);
            self.report_progress(
                ProgressUpdate::new(stage, 0.0, format!("Running {}...", stage.display_name()))
                    .with_shape(table.shape()),
            );

            let stage_start = Instant::now();
            let errors_before = ctx.diagnostics.count(Severity::Error);
            let encodings_before = ctx.encodings.len();
            let shape_before = table.shape();

            // A failed stage leaves neither its events nor its encodings.
            match runner(stage, &table, &mut ctx.diagnostics, &mut ctx.encodings) {
                Ok(next) => {
                    ctx.diagnostics.commit_stage();
                    table = next;
                }
                Err(StageError::Internal(reason)) => {
                    ctx.diagnostics.discard_stage();
                    ctx.encodings.truncate(encodings_before);
                    ctx.diagnostics
                        .error(format!("{} failed, keeping its input: {}", stage.display_name(), reason));
                }
                Err(StageError::Fatal(cause)) => {
                    ctx.diagnostics.discard_stage();
                    ctx.encodings.truncate(encodings_before);
                    return Err(self.abort(ctx, stage, cause, table, shape_before, stage_start));
                }
            }

            let status = if ctx.diagnostics.count(Severity::Error) > errors_before {
                StageStatus::FellBack
            } else {
                StageStatus::Applied
            };
            ctx.records.push(record(stage, status, shape_before, table.shape(), stage_start));
            debug!(
                "{} {:?}: {:?} -> {:?}",
                stage.display_name(),
                status,
                shape_before,
                table.shape()
            );
            self.report_progress(
                ProgressUpdate::new(stage, 1.0, format!("{} complete", stage.display_name()))
                    .with_shape(table.shape()),
            );
        }

        ctx.transition(PipelineState::Done);
        let summary = RunSummary {
            duration_ms: start_time.elapsed().as_millis() as u64,
            rows_before,
            rows_after: table.height(),
            columns_before,
            columns_after: table.width(),
            stages: ctx.records,
            warnings: ctx.diagnostics.count(Severity::Warning),
            errors: ctx.diagnostics.count(Severity::Error),
        };
        info!(
            run_id,
            "Pipeline finished: {} rows x {} columns, {} warnings, {} errors",
            summary.rows_after,
            summary.columns_after,
            summary.warnings,
            summary.errors
        );
        self.report_progress(
            ProgressUpdate::complete("Pipeline completed successfully").with_shape(table.shape()),
        );

        Ok(PipelineOutcome {
            run_id: ctx.run_id,
            table,
            state: ctx.state,
            diagnostics: ctx.diagnostics.into_events(),
            encodings: ctx.encodings,
            summary,
        })
    }

    fn abort(
        &self,
        mut ctx: RunContext,
        stage: PipelineStage,
        cause: PipelineError,
        last_table: DataFrame,
        shape_before: (usize, usize),
        stage_start: Instant,
    ) -> PipelineError {
        let reason = cause.to_string();
        error!(run_id = ctx.run_id, stage = %stage, "Pipeline aborted: {}", reason);
        ctx.diagnostics
            .error(format!("{} failed catastrophically: {}", stage.display_name(), reason));
        ctx.records.push(record(
            stage,
            StageStatus::Aborted,
            shape_before,
            last_table.shape(),
            stage_start,
        ));
        ctx.transition(PipelineState::Failed);
        self.report_progress(ProgressUpdate::failed(reason.clone()));

        PipelineError::Catastrophic {
            stage,
            reason,
            partial: Box::new(PartialRun {
                last_table,
                diagnostics: ctx.diagnostics.into_events(),
            }),
        }
    }

    /// Dispatch one stage according to the configuration.
    fn run_stage(
        &self,
        stage: PipelineStage,
        df: &DataFrame,
        diagnostics: &mut Diagnostics,
        encodings: &mut Vec<LabelEncoding>,
    ) -> StageResult {
        let config = &self.config;
        match stage {
            PipelineStage::Cleaning => {
                // Name normalization runs outside the stage guard.
                let renamed = BasicCleaner::normalize_names(df.clone())
                    .map_err(|e| StageError::Fatal(PipelineError::Polars(e)))?;
                Ok(BasicCleaner::clean_values(renamed, diagnostics))
            }
            PipelineStage::Duplicates => {
                DuplicateResolver::new(config.duplicate_strategy).resolve(df, diagnostics)
            }
            PipelineStage::MissingValues => {
                MissingValueImputer::new(config.missing_strategy, config.missing_warning_threshold)
                    .impute(df, diagnostics)
            }
            PipelineStage::TypeCoercion => {
                // Candidate detection runs outside the stage guard.
                let candidates = TypeCoercer::candidates(df)
                    .map_err(|e| StageError::Fatal(PipelineError::Polars(e)))?;
                TypeCoercer::coerce(df, &candidates, diagnostics)
            }
            PipelineStage::Outliers => {
                OutlierHandler::new(config.outlier_strategy).handle(df, diagnostics)
            }
            PipelineStage::Encoding => {
                let encoder = CategoricalEncoder::new(
                    config.encoding_strategy,
                    config.onehot_max_cardinality,
                    config.keep_label_source,
                );
                let (encoded, new_encodings) = encoder.encode(df, diagnostics)?;
                encodings.extend(new_encodings);
                Ok(encoded)
            }
            PipelineStage::Scaling => {
                FeatureScaler::new(config.scaling_strategy).scale(df, diagnostics)
            }
            PipelineStage::Selection => {
                FeatureSelector::new(config.correlation_threshold).select(df, diagnostics)
            }
            PipelineStage::Reduction => {
                DimensionalityReducer::new(config.pca_variance).reduce(df, diagnostics)
            }
        }
    }
}

fn record(
    stage: PipelineStage,
    status: StageStatus,
    (rows_before, columns_before): (usize, usize),
    (rows_after, columns_after): (usize, usize),
    started: Instant,
) -> StageRecord {
    StageRecord {
        stage,
        status,
        rows_before,
        rows_after,
        columns_before,
        columns_after,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// Builder for creating a [`Pipeline`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let log = SharedDiagnosticLog::new();
/// let pipeline = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .shared_log(log.clone())
///     .build()?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    sink: Option<SinkTarget>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Forward every diagnostic of every run to `sink`.
    pub fn diagnostics_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.sink = Some(SinkTarget::Fixed(sink));
        self
    }

    /// Append diagnostics to a log shared with other pipelines, tagged
    /// with the id of the run that emitted them.
    pub fn shared_log(mut self, log: SharedDiagnosticLog) -> Self {
        self.sink = Some(SinkTarget::Shared(log));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            sink: self
                .sink
                .unwrap_or_else(|| SinkTarget::Fixed(Arc::new(NullSink))),
        })
    }
}
