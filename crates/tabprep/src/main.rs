//! CLI entry point for the tabular preparation pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabprep::{
    DataProfiler, DuplicateStrategy, EncodingStrategy, MissingValueStrategy, OutlierStrategy,
    Pipeline, PipelineConfig, PipelineError, PipelineOutcome, ReportGenerator, RunReport,
    ScalingStrategy, TableSummary, TracingSink,
};
use tracing::{debug, error, info, warn};

/// CLI-compatible duplicate strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDuplicateStrategy {
    /// Keep the first copy of each repeated row
    First,
    /// Keep the last copy of each repeated row
    Last,
    /// Remove every copy of a repeated row
    All,
}

impl From<CliDuplicateStrategy> for DuplicateStrategy {
    fn from(cli: CliDuplicateStrategy) -> Self {
        match cli {
            CliDuplicateStrategy::First => DuplicateStrategy::First,
            CliDuplicateStrategy::Last => DuplicateStrategy::Last,
            CliDuplicateStrategy::All => DuplicateStrategy::All,
        }
    }
}

/// CLI-compatible missing value strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMissingStrategy {
    /// Drop rows with missing values
    Drop,
    /// Fill numeric columns with their mean
    Mean,
    /// Fill numeric columns with their median
    Median,
    /// Fill with the most frequent value
    MostFrequent,
    /// Fill with 0, "Unknown", false or the epoch
    Constant,
}

impl From<CliMissingStrategy> for MissingValueStrategy {
    fn from(cli: CliMissingStrategy) -> Self {
        match cli {
            CliMissingStrategy::Drop => MissingValueStrategy::Drop,
            CliMissingStrategy::Mean => MissingValueStrategy::Mean,
            CliMissingStrategy::Median => MissingValueStrategy::Median,
            CliMissingStrategy::MostFrequent => MissingValueStrategy::MostFrequent,
            CliMissingStrategy::Constant => MissingValueStrategy::Constant,
        }
    }
}

/// CLI-compatible outlier strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierStrategy {
    /// Clip to the 1.5 IQR fences
    Iqr,
    /// Clip to three standard deviations around the mean
    Zscore,
}

impl From<CliOutlierStrategy> for OutlierStrategy {
    fn from(cli: CliOutlierStrategy) -> Self {
        match cli {
            CliOutlierStrategy::Iqr => OutlierStrategy::Iqr,
            CliOutlierStrategy::Zscore => OutlierStrategy::ZScore,
        }
    }
}

/// CLI-compatible encoding strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncodingStrategy {
    /// One-hot for low cardinality, label encoding otherwise
    Auto,
    /// Indicator columns, first level dropped
    Onehot,
    /// Integer codes in `{column}_encoded`
    Label,
}

impl From<CliEncodingStrategy> for EncodingStrategy {
    fn from(cli: CliEncodingStrategy) -> Self {
        match cli {
            CliEncodingStrategy::Auto => EncodingStrategy::Auto,
            CliEncodingStrategy::Onehot => EncodingStrategy::OneHot,
            CliEncodingStrategy::Label => EncodingStrategy::Label,
        }
    }
}

/// CLI-compatible scaling strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScalingStrategy {
    /// Zero mean, unit variance
    Standard,
    /// Centered on the median, divided by the IQR
    Robust,
    /// Rescaled to [0, 1]
    Minmax,
}

impl From<CliScalingStrategy> for ScalingStrategy {
    fn from(cli: CliScalingStrategy) -> Self {
        match cli {
            CliScalingStrategy::Standard => ScalingStrategy::Standard,
            CliScalingStrategy::Robust => ScalingStrategy::Robust,
            CliScalingStrategy::Minmax => ScalingStrategy::MinMax,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Configurable preparation pipeline for tabular data",
    long_about = "Cleans, types, imputes, clips, encodes and scales a CSV table.\n\n\
                  EXAMPLES:\n  \
                  # Default stages\n  \
                  tabprep -i data.csv\n\n  \
                  # Choose strategies and the output file\n  \
                  tabprep -i data.csv -o prepared.csv --missing most-frequent --scaling robust\n\n  \
                  # Load settings from a JSON file and print a JSON report\n  \
                  tabprep -i data.csv --config prep.json --json\n\n  \
                  # Profile the input without running the pipeline\n  \
                  tabprep -i data.csv --summary-only"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: String,

    /// Path of the prepared CSV
    ///
    /// If not specified, uses "<input_name>_prepared.csv" next to the input
    #[arg(short, long)]
    output: Option<String>,

    /// JSON configuration file; the flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Strategy for repeated rows
    #[arg(long, value_enum)]
    duplicates: Option<CliDuplicateStrategy>,

    /// Strategy for missing values
    #[arg(long, value_enum)]
    missing: Option<CliMissingStrategy>,

    /// Strategy for outliers
    #[arg(long, value_enum)]
    outliers: Option<CliOutlierStrategy>,

    /// Strategy for categorical columns
    #[arg(long, value_enum)]
    encoding: Option<CliEncodingStrategy>,

    /// Strategy for numeric columns
    #[arg(long, value_enum)]
    scaling: Option<CliScalingStrategy>,

    /// Disable duplicate removal
    #[arg(long)]
    no_duplicates: bool,

    /// Disable missing value handling
    #[arg(long)]
    no_missing: bool,

    /// Disable outlier handling
    #[arg(long)]
    no_outliers: bool,

    /// Disable categorical encoding
    #[arg(long)]
    no_encoding: bool,

    /// Disable scaling
    #[arg(long)]
    no_scaling: bool,

    /// Drop constant and highly correlated columns
    #[arg(long)]
    select_features: bool,

    /// Absolute correlation above which a column is dropped
    #[arg(long)]
    correlation_threshold: Option<f64>,

    /// Replace numeric columns by principal components
    #[arg(long)]
    reduce: bool,

    /// Explained variance kept by the principal components (0.0 - 1.0]
    #[arg(long)]
    pca_variance: Option<f64>,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report next to the output file
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Profile the input and exit without running the pipeline
    #[arg(long)]
    summary_only: bool,

    /// Numeric column the profile ranks the other numeric columns against
    #[arg(long, default_value = "target")]
    target: String,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading table from: {}", args.input);
    let data = load_csv(&args.input)?;
    info!("Table loaded: {:?}", data.shape());

    if args.summary_only {
        return print_input_summary(&args, &data);
    }

    let config = build_config(&args)?;
    let pipeline = build_pipeline(&args, config)?;

    run_pipeline(&pipeline, &args, data)
}

/// Start from the config file (or defaults) and apply command line overrides.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => std::env::var("TABPREP_CONFIG")
            .ok()
            .map(PipelineConfig::from_json_file)
            .transpose()?
            .unwrap_or_default(),
    };

    if let Some(strategy) = args.duplicates {
        config.remove_duplicates = true;
        config.duplicate_strategy = strategy.into();
    }
    if let Some(strategy) = args.missing {
        config.handle_missing = true;
        config.missing_strategy = strategy.into();
    }
    if let Some(strategy) = args.outliers {
        config.handle_outliers = true;
        config.outlier_strategy = strategy.into();
    }
    if let Some(strategy) = args.encoding {
        config.encode_categoricals = true;
        config.encoding_strategy = strategy.into();
    }
    if let Some(strategy) = args.scaling {
        config.scale_features = true;
        config.scaling_strategy = strategy.into();
    }

    config.remove_duplicates &= !args.no_duplicates;
    config.handle_missing &= !args.no_missing;
    config.handle_outliers &= !args.no_outliers;
    config.encode_categoricals &= !args.no_encoding;
    config.scale_features &= !args.no_scaling;
    config.select_features |= args.select_features;
    config.reduce_dimensions |= args.reduce;

    if let Some(threshold) = args.correlation_threshold {
        config.correlation_threshold = threshold;
    }
    if let Some(fraction) = args.pca_variance {
        config.pca_variance = fraction;
    }

    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !args.json {
        builder = builder.diagnostics_sink(Arc::new(TracingSink));
    }

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.state,
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Run pipeline and print results
fn run_pipeline(pipeline: &Pipeline, args: &Args, data: DataFrame) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting preparation pipeline...");
    info!("{}", "=".repeat(80));

    let original_df = data.clone();

    match pipeline.run(data) {
        Ok(mut outcome) => handle_pipeline_output(pipeline, &mut outcome, &original_df, args),
        Err(PipelineError::Catastrophic {
            stage,
            reason,
            partial,
        }) => {
            error!(
                "Pipeline aborted during {}: {} (last good table: {} rows x {} columns, {} diagnostics)",
                stage,
                reason,
                partial.last_table.height(),
                partial.last_table.width(),
                partial.diagnostics.len()
            );
            Err(anyhow!("Pipeline failed during {}: {}", stage, reason))
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

/// Handle pipeline output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
/// - `--emit-report`: Write JSON report to file
fn handle_pipeline_output(
    pipeline: &Pipeline,
    outcome: &mut PipelineOutcome,
    original_df: &DataFrame,
    args: &Args,
) -> Result<()> {
    let output_path = output_path(args);
    write_csv(&mut outcome.table, &output_path)?;
    info!("Prepared table written to: {}", output_path.display());

    let report = ReportGenerator::build(pipeline.config(), original_df, outcome)?
        .with_files(&args.input, Some(output_path.display().to_string()));

    if args.emit_report {
        let report_dir = output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let generator = ReportGenerator::new(report_dir);
        let report_path = generator.write_report_to_file(&report, &extract_file_stem(&args.input))?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report);
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

fn output_path(args: &Args) -> PathBuf {
    match &args.output {
        Some(path) => PathBuf::from(path),
        None => {
            let name = format!("{}_prepared.csv", extract_file_stem(&args.input));
            Path::new(&args.input)
                .parent()
                .map(|dir| dir.join(&name))
                .unwrap_or_else(|| PathBuf::from(name))
        }
    }
}

fn load_csv(path: &str) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .with_context(|| format!("reading {path}"))
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("writing {}", path.display()))
}

/// Profile the input table without running any stage.
///
/// Uses `println!` intentionally: this listing is the purpose of the flag
/// and must be visible regardless of the log level.
fn print_input_summary(args: &Args, data: &DataFrame) -> Result<()> {
    let summary = DataProfiler::summarize_with_target(data, &args.target)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("TABLE SUMMARY: {}", args.input);
    println!("{}\n", "=".repeat(80));
    print_table_summary(&summary);
    Ok(())
}

fn print_table_summary(summary: &TableSummary) {
    println!("  Rows: {}", summary.rows);
    println!("  Columns: {}", summary.columns);
    println!("  Duplicate rows: {}", summary.duplicate_rows);
    println!();

    println!(
        "{:<24} {:<14} {:<12} {:<10} {:<10}",
        "Column", "Type", "Kind", "Missing %", "Distinct"
    );
    println!("{}", "-".repeat(72));
    for column in &summary.column_summaries {
        println!(
            "{:<24} {:<14} {:<12} {:<10.1} {:<10}",
            truncate_str(&column.name, 23),
            truncate_str(&column.dtype, 13),
            column.kind.to_string(),
            column.missing_percentage,
            column.distinct
        );
    }
    println!();

    if !summary.chi_square.is_empty() {
        println!("Chi-square tests (equal level frequencies):");
        for test in &summary.chi_square {
            println!(
                "  {:<24} chi2 = {:<12.4} df = {:<4} p = {:.4}",
                truncate_str(&test.column, 23),
                test.statistic,
                test.degrees_of_freedom,
                test.p_value
            );
        }
        println!();
    }

    if let Some(target) = &summary.target {
        println!("Feature importance (correlation with '{target}'):");
        for feature in &summary.feature_importance {
            println!("  {:<24} {:>8.4}", truncate_str(&feature.column, 23), feature.coefficient);
        }
        println!();
    }

    if !summary.insights.is_empty() {
        println!("Insights:");
        for insight in &summary.insights {
            println!("  - {}", insight.describe());
        }
        println!();
    }
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a human-readable summary of the run.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(report: &RunReport) {
    let summary = &report.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("PREPARATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    if let Some(ref input_file) = report.input_file {
        println!(
            "Input:  {} ({} rows x {} columns)",
            input_file, summary.rows_before, summary.columns_before
        );
    }
    if let Some(ref output_file) = report.output_file {
        println!(
            "Output: {} ({} rows x {} columns)",
            output_file, summary.rows_after, summary.columns_after
        );
    }
    println!();

    println!("Stages:");
    for record in &summary.stages {
        println!(
            "  {:<22} {:<10} {:>6} -> {:<6} rows  {:>4} -> {:<4} columns  {}ms",
            record.stage.display_name(),
            format!("{:?}", record.status),
            record.rows_before,
            record.rows_after,
            record.columns_before,
            record.columns_after,
            record.duration_ms
        );
    }
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed, {:.1}%)",
        summary.rows_before,
        summary.rows_after,
        summary.rows_removed(),
        summary.rows_removed_percentage()
    );
    println!(
        "  Columns: {} -> {}",
        summary.columns_before, summary.columns_after
    );
    println!(
        "  Diagnostics: {} warnings, {} errors",
        summary.warnings, summary.errors
    );
    println!();

    let fallen_back = summary.fallen_back();
    if !fallen_back.is_empty() {
        warn!("Stages that kept their input: {:?}", fallen_back);
    }

    if !report.encodings.is_empty() {
        println!("Label Encodings:");
        for encoding in &report.encodings {
            println!(
                "  {} -> {} ({} classes)",
                encoding.column,
                encoding.encoded_column,
                encoding.classes.len()
            );
        }
        println!();
    }

    if !report.validation.is_empty() {
        println!("Validation:");
        for issue in &report.validation {
            println!("  ! {}", issue.describe());
        }
        println!();
    }

    if !report.insights.is_empty() {
        println!("Insights:");
        for insight in &report.insights {
            println!("  - {}", insight);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
}
