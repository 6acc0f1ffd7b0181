//! Integration tests for the preparation pipeline.
//!
//! These tests verify end-to-end behavior of the pipeline on small tables
//! and on a CSV fixture.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tabprep::{
    BasicCleaner, ConfigValidationError, Diagnostics, DuplicateStrategy, EncodingStrategy,
    MissingValueStrategy, OutlierStrategy, Pipeline, PipelineConfig, PipelineError,
    PipelineOutcome, PipelineStage, PipelineState, ProgressUpdate, ReportGenerator,
    ScalingStrategy, Severity, SharedDiagnosticLog, StageStatus,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn run(config: PipelineConfig, df: DataFrame) -> PipelineOutcome {
    Pipeline::builder()
        .config(config)
        .build()
        .expect("valid config")
        .run(df)
        .expect("pipeline should complete")
}

fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn has_message(outcome: &PipelineOutcome, message: &str) -> bool {
    outcome.diagnostics.iter().any(|event| event.message == message)
}

// ============================================================================
// Full Pipeline Tests with Fixture Data
// ============================================================================

#[test]
fn test_full_pipeline_customers() {
    let df = load_csv("customers.csv");
    assert_eq!(df.shape(), (11, 7));

    let outcome = run(PipelineConfig::default(), df);

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.table.height(), 10);
    assert!(outcome.table.column("notes").is_err());
    assert!(matches!(
        outcome.table.column("signup_date").unwrap().dtype(),
        DataType::Datetime(TimeUnit::Milliseconds, _)
    ));
    assert!(outcome.table.column("plan_free").is_ok());
    assert!(outcome.table.column("plan_premium").is_ok());
    assert!(outcome.table.column("plan_basic").is_err());
    assert!(has_message(&outcome, "Removed 1 duplicate rows."));
    assert!(has_message(&outcome, "Dropped column 'notes' with no values."));

    let spend: Vec<f64> = floats(&outcome.table, "monthly_spend")
        .into_iter()
        .map(|v| v.expect("imputed"))
        .collect();
    let mean = spend.iter().sum::<f64>() / spend.len() as f64;
    assert!(mean.abs() < 1e-9);
}

#[test]
fn test_pipeline_summary_tracks_stages() {
    let outcome = run(PipelineConfig::default(), load_csv("customers.csv"));
    let summary = &outcome.summary;

    assert_eq!(summary.rows_before, 11);
    assert_eq!(summary.rows_after, 10);
    assert_eq!(summary.rows_removed(), 1);
    assert_eq!(
        summary.stages.iter().map(|r| r.stage).collect::<Vec<_>>(),
        PipelineConfig::default().enabled_stages()
    );
    assert!(summary.stages.iter().all(|r| r.status == StageStatus::Applied));
    assert!(summary.fallen_back().is_empty());
}

#[test]
fn test_rows_never_increase() {
    let outcome = run(PipelineConfig::default(), load_csv("customers.csv"));

    let mut rows = outcome.summary.rows_before;
    for record in &outcome.summary.stages {
        assert_eq!(record.rows_before, rows);
        assert!(record.rows_after <= record.rows_before, "{:?}", record.stage);
        rows = record.rows_after;
    }
    assert_eq!(rows, outcome.table.height());
}

#[test]
fn test_output_is_rectangular() {
    let outcome = run(PipelineConfig::default(), load_csv("customers.csv"));
    let height = outcome.table.height();
    for column in outcome.table.get_columns() {
        assert_eq!(column.len(), height, "{}", column.name());
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = PipelineConfig::builder()
        .select_features(true)
        .reduce_dimensions(true)
        .build()
        .unwrap();

    let first = run(config.clone(), load_csv("customers.csv"));
    let second = run(config, load_csv("customers.csv"));

    assert!(first.table.equals_missing(&second.table));
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn test_cleaning_is_idempotent_on_fixture() {
    let mut diagnostics = Diagnostics::detached();
    let clean = |df: DataFrame, diagnostics: &mut Diagnostics| {
        BasicCleaner::clean_values(BasicCleaner::normalize_names(df).unwrap(), diagnostics)
    };

    let once = clean(load_csv("customers.csv"), &mut diagnostics);
    let twice = clean(once.clone(), &mut diagnostics);

    assert_eq!(names(&once), names(&twice));
    assert!(once.equals_missing(&twice));
}

// ============================================================================
// Single Stage Scenarios
// ============================================================================

#[test]
fn test_duplicates_keep_first() {
    let df = df![
        "id" => [1, 1, 2],
        "city" => ["a", "a", "b"],
    ]
    .unwrap();
    let config = PipelineConfig {
        remove_duplicates: true,
        duplicate_strategy: DuplicateStrategy::First,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(outcome.table.height(), 2);
    assert!(has_message(&outcome, "Removed 1 duplicate rows."));
}

#[test]
fn test_median_imputation() {
    let df = df!["x" => [Some(10.0), None, Some(30.0)]].unwrap();
    let config = PipelineConfig {
        handle_missing: true,
        missing_strategy: MissingValueStrategy::Median,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(floats(&outcome.table, "x"), vec![Some(10.0), Some(20.0), Some(30.0)]);
}

#[test]
fn test_iqr_clipping() {
    let df = df!["x" => [1i64, 2, 3, 4, 100]].unwrap();
    let config = PipelineConfig {
        handle_outliers: true,
        outlier_strategy: OutlierStrategy::Iqr,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(
        floats(&outcome.table, "x"),
        vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(7.0)]
    );
    assert!(has_message(&outcome, "Found 1 outliers in column 'x'."));
}

#[test]
fn test_iqr_clipping_with_zero_spread() {
    let df = df!["x" => [1i64, 1, 1, 1, 1, 1, 100]].unwrap();
    let config = PipelineConfig {
        handle_outliers: true,
        outlier_strategy: OutlierStrategy::Iqr,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(floats(&outcome.table, "x"), vec![Some(1.0); 7]);
    assert_eq!(outcome.table.column("x").unwrap().dtype(), &DataType::Int64);
    assert!(has_message(&outcome, "Found 1 outliers in column 'x'."));
}

#[test]
fn test_constant_imputation_does_not_block_coercion() {
    let df = df![
        "amount" => [Some("1"), None, Some("3")],
        "city" => [Some("paris"), None, Some("rome")],
    ]
    .unwrap();
    let config = PipelineConfig {
        handle_missing: true,
        missing_strategy: MissingValueStrategy::Constant,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(outcome.table.column("amount").unwrap().dtype(), &DataType::Int64);
    assert_eq!(floats(&outcome.table, "amount"), vec![Some(1.0), None, Some(3.0)]);
    assert!(has_message(&outcome, "Converted column 'amount' to numeric."));
    let city: Vec<Option<&str>> = outcome
        .table
        .column("city")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(city, vec![Some("paris"), Some("Unknown"), Some("rome")]);
}

#[test]
fn test_one_hot_drops_first_level() {
    let df = df!["color" => ["red", "blue", "green", "red"]].unwrap();
    let config = PipelineConfig {
        encode_categoricals: true,
        encoding_strategy: EncodingStrategy::OneHot,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(names(&outcome.table), vec!["color_green", "color_red"]);
    let green = floats(&outcome.table, "color_green");
    let red = floats(&outcome.table, "color_red");
    for (g, r) in green.iter().zip(&red) {
        assert!(g.unwrap() + r.unwrap() <= 1.0);
    }
}

#[test]
fn test_label_encoding_decodes() {
    let df = df!["city" => ["paris", "rome", "paris"]].unwrap();
    let config = PipelineConfig {
        encode_categoricals: true,
        encoding_strategy: EncodingStrategy::Label,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(names(&outcome.table), vec!["city", "city_encoded"]);
    assert_eq!(
        floats(&outcome.table, "city_encoded"),
        vec![Some(0.0), Some(1.0), Some(0.0)]
    );
    let encoding = outcome.encoding_for("city").unwrap();
    assert_eq!(encoding.decode(1), Some("rome"));
    assert_eq!(encoding.encode("paris"), Some(0));
}

#[test]
fn test_standard_scaling_with_constant_column() {
    let df = df![
        "a" => [1.0, 2.0, 3.0, 4.0],
        "k" => [5i64, 5, 5, 5],
    ]
    .unwrap();
    let config = PipelineConfig {
        scale_features: true,
        scaling_strategy: ScalingStrategy::Standard,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    let a: Vec<f64> = floats(&outcome.table, "a").into_iter().flatten().collect();
    let mean = a.iter().sum::<f64>() / a.len() as f64;
    let std = (a.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / a.len() as f64).sqrt();
    assert!(mean.abs() < 1e-9);
    assert!((std - 1.0).abs() < 1e-9);
    assert_eq!(floats(&outcome.table, "k"), vec![Some(0.0); 4]);
}

#[test]
fn test_selection_prunes_constant_columns() {
    let df = df![
        "a" => [1.0, 2.0, 3.0],
        "k" => [1, 1, 1],
        "c" => ["x", "x", "x"],
    ]
    .unwrap();
    let config = PipelineConfig {
        select_features: true,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(names(&outcome.table), vec!["a"]);
}

#[test]
fn test_type_coercion_of_text_columns() {
    let df = df![
        "when" => ["2024-01-01", "2024-02-01", "2024-03-01"],
        "qty" => ["1", "2", " 3 "],
        "label" => ["a", "2", "c"],
    ]
    .unwrap();

    let outcome = run(PipelineConfig::minimal(), df);

    assert!(matches!(
        outcome.table.column("when").unwrap().dtype(),
        DataType::Datetime(TimeUnit::Milliseconds, _)
    ));
    assert_eq!(outcome.table.column("qty").unwrap().dtype(), &DataType::Int64);
    assert_eq!(outcome.table.column("label").unwrap().dtype(), &DataType::String);
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[test]
fn test_invalid_config_is_rejected() {
    let err = PipelineConfig::builder().pca_variance(0.0).build().unwrap_err();
    assert!(matches!(err, ConfigValidationError::OutOfRange { .. }));

    let err = PipelineConfig::from_json_str(r#"{"correlation_threshold": 1.5}"#).unwrap_err();
    assert!(err.is_config_error());
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[test]
fn test_reduction_falls_back_on_missing_values() {
    let df = df![
        "x" => [Some(1.0), None, Some(3.0), Some(4.0)],
        "y" => [Some(2.0), Some(1.0), None, Some(5.0)],
    ]
    .unwrap();
    let config = PipelineConfig {
        reduce_dimensions: true,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df.clone());

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(outcome.table.equals_missing(&df));
    assert_eq!(outcome.summary.fallen_back(), vec![PipelineStage::Reduction]);
    let errors: Vec<_> = outcome.diagnostics_with(Severity::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].stage, PipelineStage::Reduction);
}

#[test]
fn test_reduction_replaces_numeric_columns() {
    let df = df![
        "x" => [1.0, 2.0, 3.0, 4.0, 5.0],
        "y" => [2.0, 4.1, 6.0, 8.2, 10.0],
        "tag" => ["a", "b", "a", "b", "a"],
    ]
    .unwrap();
    let config = PipelineConfig {
        reduce_dimensions: true,
        pca_variance: 0.9,
        ..PipelineConfig::minimal()
    };

    let outcome = run(config, df);

    assert_eq!(names(&outcome.table), vec!["PC_1", "tag"]);
    assert_eq!(outcome.table.height(), 5);
}

// ============================================================================
// Progress and Diagnostics Tests
// ============================================================================

#[test]
fn test_progress_reporting_invoked() {
    let count = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(None::<ProgressUpdate>));
    let (count_ref, last_ref) = (Arc::clone(&count), Arc::clone(&last));

    Pipeline::builder()
        .on_progress(move |update| {
            count_ref.fetch_add(1, Ordering::SeqCst);
            *last_ref.lock().unwrap() = Some(update);
        })
        .build()
        .unwrap()
        .run(load_csv("customers.csv"))
        .unwrap();

    // Two updates per enabled stage plus completion.
    let stages = PipelineConfig::default().enabled_stages().len();
    assert_eq!(count.load(Ordering::SeqCst), stages * 2 + 1);
    let last = last.lock().unwrap().clone().unwrap();
    assert_eq!(last.state, PipelineState::Done);
    assert_eq!(last.progress, 1.0);
}

#[test]
fn test_concurrent_runs_share_a_log() {
    let log = SharedDiagnosticLog::new();
    let pipeline = Pipeline::builder().shared_log(log.clone()).build().unwrap();

    let outcomes: Vec<PipelineOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| scope.spawn(|| pipeline.run(load_csv("customers.csv")).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let total: usize = outcomes.iter().map(|o| o.diagnostics.len()).sum();
    assert_eq!(log.len(), total);
    for outcome in &outcomes {
        assert_eq!(log.events_for(outcome.run_id), outcome.diagnostics);
    }
}

#[test]
fn test_report_from_run() {
    let df = load_csv("customers.csv");
    let config = PipelineConfig::default();
    let outcome = run(config.clone(), df.clone());

    let report = ReportGenerator::build(&config, &df, &outcome).unwrap();

    assert_eq!(report.before.rows, 11);
    assert_eq!(report.before.duplicate_rows, 1);
    assert_eq!(report.after.rows, 10);
    assert_eq!(report.summary, outcome.summary);
}
