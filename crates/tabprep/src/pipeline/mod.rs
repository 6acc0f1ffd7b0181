//! Pipeline module.
//!
//! This module provides the orchestrator, its state machine, progress
//! reporting and the diagnostic log stages report to.

mod builder;
pub mod diagnostics;
pub mod outliers;
pub mod progress;
pub mod stage;

pub use builder::{Pipeline, PipelineBuilder};
pub use diagnostics::{
    ClosureSink, DiagnosticEvent, Diagnostics, DiagnosticsSink, NullSink, RunLogSink,
    Severity, SharedDiagnosticLog, TaggedEvent, TracingSink,
};
pub use outliers::OutlierHandler;
pub use progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate};
pub use stage::{PipelineStage, PipelineState};
