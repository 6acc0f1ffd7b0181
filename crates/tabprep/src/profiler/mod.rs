//! Data profiling module.
//!
//! - Column classification into semantic kinds
//! - Descriptive statistics per column
//! - Correlations, chi-square tests, feature importance and insights over
//!   a whole table

mod classifier;
pub mod statistics;

pub use classifier::{ColumnKind, ColumnKinds, classify, column_kind};

use crate::cleaner::count_duplicate_rows;
use crate::types::{
    ChiSquareTest, ColumnSummary, CorrelationPair, FeatureImportance, Insight, NumericSummary,
    TableSummary,
};
use crate::utils::{
    column_series, distinct_present, is_numeric_dtype, missing_percentage, most_frequent_index,
    numeric_values, text_values,
};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Missing percentage above which a column is reported.
pub const HIGH_MISSING_PERCENTAGE: f64 = 20.0;

/// Absolute correlation above which a pair is reported.
pub const STRONG_CORRELATION: f64 = 0.8;

/// Column feature importance is measured against by [`DataProfiler::summarize`].
pub const DEFAULT_TARGET: &str = "target";

/// Number of columns named by the top features insight.
pub const TOP_FEATURES: usize = 5;

/// Data profiler for analyzing table structure and content.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile `df`, measuring feature importance against a column named
    /// [`DEFAULT_TARGET`] when there is one.
    pub fn summarize(df: &DataFrame) -> Result<TableSummary> {
        Self::summarize_with_target(df, DEFAULT_TARGET)
    }

    /// Profile every column of `df`, correlate its numeric columns, test
    /// its categorical columns, and rank numeric columns by correlation
    /// with `target`. Importance is left empty when `target` is missing
    /// or not numeric.
    pub fn summarize_with_target(df: &DataFrame, target: &str) -> Result<TableSummary> {
        let kinds = classify(df)?;

        let mut column_summaries = Vec::with_capacity(df.width());
        for (name, kind) in kinds.iter() {
            column_summaries.push(Self::summarize_column(column_series(df, name)?, kind)?);
        }

        let numeric = kinds.names_of(ColumnKind::Numeric);
        let correlations = Self::correlations(df, &numeric)?;
        let chi_square = Self::chi_square_tests(df, &kinds.names_of(ColumnKind::Categorical))?;

        let has_target = df
            .column(target)
            .is_ok_and(|column| is_numeric_dtype(column.dtype()));
        let feature_importance = if has_target {
            Self::feature_importance(df, target, &numeric)?
        } else {
            debug!("No numeric column '{}', skipping feature importance", target);
            Vec::new()
        };
        let target = has_target.then(|| target.to_string());

        let mut insights = Self::insights(&column_summaries, &correlations);
        if let Some(target) = &target
            && !feature_importance.is_empty()
        {
            insights.push(Insight::TopFeatures {
                target: target.clone(),
                features: feature_importance
                    .iter()
                    .take(TOP_FEATURES)
                    .map(|f| f.column.clone())
                    .collect(),
            });
        }

        Ok(TableSummary {
            rows: df.height(),
            columns: df.width(),
            duplicate_rows: count_duplicate_rows(df)?,
            column_summaries,
            correlations,
            chi_square,
            target,
            feature_importance,
            insights,
        })
    }

    fn summarize_column(series: &Series, kind: ColumnKind) -> Result<ColumnSummary> {
        let missing = series.null_count();
        let numeric = if kind == ColumnKind::Numeric {
            Self::numeric_summary(series)?
        } else {
            None
        };
        let most_frequent = if kind == ColumnKind::Numeric {
            None
        } else {
            let keys = text_values(series)?;
            most_frequent_index(&keys).and_then(|idx| keys[idx].clone())
        };

        Ok(ColumnSummary {
            name: series.name().to_string(),
            dtype: series.dtype().to_string(),
            kind,
            count: series.len() - missing,
            missing,
            missing_percentage: missing_percentage(series),
            distinct: distinct_present(series)?,
            numeric,
            most_frequent,
        })
    }

    fn numeric_summary(series: &Series) -> Result<Option<NumericSummary>> {
        let values = statistics::float_values(series)?;
        let (Some(mean), Some(min), Some(max)) = (values.mean(), values.min(), values.max()) else {
            return Ok(None);
        };
        let Some((q1, median, q3)) = statistics::quartiles(&values)? else {
            return Ok(None);
        };
        let present: Vec<f64> = (&values).into_iter().flatten().collect();

        Ok(Some(NumericSummary {
            mean,
            std: values.std(1),
            min,
            q1,
            median,
            q3,
            max,
            skewness: statistics::skewness(&present),
            kurtosis: statistics::kurtosis(&present),
        }))
    }

    /// Pearson correlation of every pair of `columns`, upper triangle in
    /// column order. Undefined pairs are left out.
    pub fn correlations(df: &DataFrame, columns: &[String]) -> Result<Vec<CorrelationPair>> {
        let values = columns
            .iter()
            .map(|name| numeric_values(column_series(df, name)?))
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut pairs = Vec::new();
        for i in 0..columns.len() {
            for j in (i + 1)..columns.len() {
                if let Some(coefficient) = statistics::pearson(&values[i], &values[j]) {
                    pairs.push(CorrelationPair {
                        left: columns[i].clone(),
                        right: columns[j].clone(),
                        coefficient,
                    });
                }
            }
        }
        Ok(pairs)
    }

    /// Chi-square goodness-of-fit of each column's level counts against
    /// equally frequent levels. Missing cells are not a level; columns
    /// with fewer than two levels are left out.
    pub fn chi_square_tests(df: &DataFrame, columns: &[String]) -> Result<Vec<ChiSquareTest>> {
        let mut tests = Vec::new();
        for name in columns {
            let non_null = column_series(df, name)?.drop_nulls();
            if non_null.is_empty() {
                continue;
            }
            let count_name = if name == "count" { "n" } else { "count" };
            let counts = non_null.value_counts(false, false, count_name.into(), false)?;
            let observed: Vec<f64> =
                statistics::float_values(counts.column(count_name)?.as_materialized_series())?
                    .into_iter()
                    .flatten()
                    .collect();

            if let Some((statistic, p_value)) = statistics::chi_square_uniform(&observed) {
                tests.push(ChiSquareTest {
                    column: name.clone(),
                    statistic,
                    p_value,
                    degrees_of_freedom: observed.len() - 1,
                });
            }
        }
        Ok(tests)
    }

    /// Pearson correlation of each of `columns` with `target`, highest
    /// first. The target itself and undefined correlations are left out.
    pub fn feature_importance(
        df: &DataFrame,
        target: &str,
        columns: &[String],
    ) -> Result<Vec<FeatureImportance>> {
        let target_values = numeric_values(column_series(df, target)?)?;

        let mut importance = Vec::new();
        for name in columns.iter().filter(|name| name.as_str() != target) {
            let values = numeric_values(column_series(df, name)?)?;
            if let Some(coefficient) = statistics::pearson(&values, &target_values) {
                importance.push(FeatureImportance {
                    column: name.clone(),
                    coefficient,
                });
            }
        }
        importance.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));
        Ok(importance)
    }

    fn insights(columns: &[ColumnSummary], correlations: &[CorrelationPair]) -> Vec<Insight> {
        let missing = columns
            .iter()
            .filter(|c| c.missing_percentage > HIGH_MISSING_PERCENTAGE)
            .map(|c| Insight::HighMissing {
                column: c.name.clone(),
                percentage: c.missing_percentage,
            });
        let correlated = correlations
            .iter()
            .filter(|pair| pair.coefficient.abs() > STRONG_CORRELATION)
            .map(|pair| Insight::StrongCorrelation {
                left: pair.left.clone(),
                right: pair.right.clone(),
                coefficient: pair.coefficient,
            });
        missing.chain(correlated).collect()
    }
}
