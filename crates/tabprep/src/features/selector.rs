//! Feature selection: zero-variance and correlation pruning.

use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use crate::profiler::{ColumnKind, classify, statistics};
use crate::utils::{column_names, column_series, distinct_present, numeric_values};
use polars::prelude::*;
use tracing::debug;

/// Drops uninformative and redundant columns.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector {
    correlation_threshold: f64,
}

impl FeatureSelector {
    pub fn new(correlation_threshold: f64) -> Self {
        Self {
            correlation_threshold,
        }
    }

    /// Columns holding at most one distinct value, in table order.
    pub fn zero_variance_columns(df: &DataFrame) -> PolarsResult<Vec<String>> {
        let mut names = Vec::new();
        for name in column_names(df) {
            if distinct_present(column_series(df, &name)?)? <= 1 {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Later column of every numeric pair whose absolute correlation
    /// exceeds the threshold.
    ///
    /// Pairs are judged on the full set of numeric columns: a column is
    /// dropped even when the earlier column it correlates with is itself
    /// dropped.
    pub fn correlated_columns(&self, df: &DataFrame) -> PolarsResult<Vec<String>> {
        let numeric = classify(df)?.names_of(ColumnKind::Numeric);
        let values = numeric
            .iter()
            .map(|name| numeric_values(column_series(df, name)?))
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut dropped = Vec::new();
        for j in 1..numeric.len() {
            let redundant = (0..j).any(|i| {
                statistics::pearson(&values[i], &values[j])
                    .is_some_and(|r| r.abs() > self.correlation_threshold)
            });
            if redundant {
                dropped.push(numeric[j].clone());
            }
        }
        Ok(dropped)
    }

    pub fn select(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let constant = Self::zero_variance_columns(df)?;
        let mut df = df.drop_many(constant.iter().map(String::as_str));
        if !constant.is_empty() {
            diagnostics.info(format!(
                "Removed {} zero-variance columns: {}",
                constant.len(),
                constant.join(", ")
            ));
        }

        let correlated = self.correlated_columns(&df)?;
        if !correlated.is_empty() {
            df = df.drop_many(correlated.iter().map(String::as_str));
            diagnostics.info(format!(
                "Removed {} highly correlated columns: {}",
                correlated.len(),
                correlated.join(", ")
            ));
        }

        debug!("Selected {} columns", df.width());
        Ok(df)
    }
}
