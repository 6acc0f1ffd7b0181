use crate::config::PipelineConfig;
use crate::pipeline::DiagnosticEvent;
use crate::profiler::DataProfiler;
use crate::quality::DataValidator;
use crate::types::{LabelEncoding, PipelineOutcome, RunSummary, TableSummary, ValidationIssue};
use anyhow::{Context, Result};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Everything known about one run, ready for JSON output.
///
/// Use this for both stdout output (`--json`) and file writing
/// (`--emit-report`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    /// Configuration the run used
    pub config: PipelineConfig,
    pub summary: RunSummary,

    /// Profile of the table as received
    pub before: TableSummary,
    /// Profile of the prepared table
    pub after: TableSummary,
    /// Rendered insights about the prepared table
    pub insights: Vec<String>,

    pub diagnostics: Vec<DiagnosticEvent>,
    pub encodings: Vec<LabelEncoding>,
    /// Validation findings on the prepared table
    pub validation: Vec<ValidationIssue>,
}

impl RunReport {
    /// Record where the data came from and went to.
    pub fn with_files(mut self, input_file: impl Into<String>, output_file: Option<String>) -> Self {
        self.input_file = Some(input_file.into());
        self.output_file = output_file;
        self
    }
}

// ============================================================================
// Report Generator
// ============================================================================

pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Build a report from the input table and the outcome of its run.
    pub fn build(config: &PipelineConfig, input: &DataFrame, outcome: &PipelineOutcome) -> Result<RunReport> {
        let before = DataProfiler::summarize(input).context("profiling input table")?;
        let after = DataProfiler::summarize(&outcome.table).context("profiling prepared table")?;
        let validation = DataValidator::validate(&outcome.table)?;

        Ok(RunReport {
            generated_at: Local::now().to_rfc3339(),
            input_file: None,
            output_file: None,
            config: config.clone(),
            summary: outcome.summary.clone(),
            insights: after.insights.iter().map(|insight| insight.describe()).collect(),
            before,
            after,
            diagnostics: outcome.diagnostics.clone(),
            encodings: outcome.encodings.clone(),
            validation,
        })
    }

    /// Write a report to `{base_name}_report.json` in the output
    /// directory.
    pub fn write_report_to_file(&self, report: &RunReport, base_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating {}", self.output_dir.display()))?;

        let report_path = self.output_dir.join(format!("{base_name}_report.json"));
        write_json(&report_path, report)?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }
}

fn write_json(path: &Path, report: &RunReport) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;
    Ok(())
}

static_assertions::assert_impl_all!(RunReport: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;

    fn run() -> (PipelineConfig, DataFrame, PipelineOutcome) {
        let config = PipelineConfig::default();
        let df = df![
            "Price" => [Some(10.0), Some(-5.0), None, Some(12.0), Some(10.0)],
            "Color" => ["red", "blue", "red", "green", "red"],
        ]
        .unwrap();
        let outcome = Pipeline::builder()
            .config(config.clone())
            .build()
            .unwrap()
            .run(df.clone())
            .unwrap();
        (config, df, outcome)
    }

    #[test]
    fn test_build_report() {
        let (config, df, outcome) = run();

        let report = ReportGenerator::build(&config, &df, &outcome).unwrap();

        assert_eq!(report.before.rows, 5);
        assert_eq!(report.before.columns, 2);
        assert_eq!(report.after.rows, outcome.table.height());
        assert_eq!(report.diagnostics, outcome.diagnostics);
        assert!(report.input_file.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let (config, df, outcome) = run();
        let report = ReportGenerator::build(&config, &df, &outcome)
            .unwrap()
            .with_files("in.csv", Some("out.csv".to_string()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["input_file"], "in.csv");
        assert!(json["summary"]["stages"].is_array());
        assert!(json["config"]["scaling_strategy"].is_string());
    }

    #[test]
    fn test_write_report_to_file() {
        let (config, df, outcome) = run();
        let report = ReportGenerator::build(&config, &df, &outcome).unwrap();
        let dir = std::env::temp_dir().join(format!("tabprep_report_{}", outcome.run_id));

        let path = ReportGenerator::new(&dir)
            .write_report_to_file(&report, "sales")
            .unwrap();

        assert!(path.ends_with("sales_report.json"));
        let written = fs::read_to_string(&path).unwrap();
        let parsed: RunReport = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.summary, report.summary);
        fs::remove_dir_all(dir).ok();
    }
}
