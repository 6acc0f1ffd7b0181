//! Statistical imputation methods.
//!
//! Provides drop, mean, median, most frequent and constant strategies.

use crate::config::MissingValueStrategy;
use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use crate::profiler::statistics;
use crate::utils::{
    FillValue, column_names, column_series, fill_nulls, missing_fraction, most_frequent_index,
    series_dtype_category, text_values, DtypeCategory,
};
use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::debug;

/// Fills or drops missing values column by column.
#[derive(Debug, Clone, Copy)]
pub struct MissingValueImputer {
    strategy: MissingValueStrategy,
    warning_threshold: f64,
}

impl MissingValueImputer {
    pub fn new(strategy: MissingValueStrategy, warning_threshold: f64) -> Self {
        Self {
            strategy,
            warning_threshold,
        }
    }

    /// Visit columns left to right. `drop` shrinks the table before the
    /// next column is looked at. A column that fails is left as-is.
    pub fn impute(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let mut df = df.clone();

        for name in column_names(&df) {
            let series = column_series(&df, &name)?;
            if series.null_count() == 0 {
                continue;
            }

            let fraction = missing_fraction(series);
            if fraction > self.warning_threshold {
                diagnostics.warn(format!(
                    "Column '{}' has {:.1}% missing values.",
                    name,
                    fraction * 100.0
                ));
            }

            match self.impute_column(&df, &name) {
                Ok((updated, message)) => {
                    df = updated;
                    diagnostics.info(message);
                }
                Err(e) => diagnostics.warn(format!("Could not impute column '{name}': {e:#}")),
            }
        }

        Ok(df)
    }

    fn impute_column(&self, df: &DataFrame, name: &str) -> Result<(DataFrame, String)> {
        let series = column_series(df, name)?;

        let fill = match self.strategy {
            MissingValueStrategy::Drop => {
                let before = df.height();
                let kept = df.filter(&series.is_not_null())?;
                let removed = before - kept.height();
                debug!("Dropped {} rows with missing '{}'", removed, name);
                return Ok((
                    kept,
                    format!("Dropped {removed} rows with missing values in '{name}'."),
                ));
            }
            MissingValueStrategy::Mean | MissingValueStrategy::Median => {
                if series_dtype_category(series) != DtypeCategory::Numeric {
                    anyhow::bail!("{} requires a numeric column", self.strategy);
                }
                let values = statistics::float_values(series)?;
                let value = if self.strategy == MissingValueStrategy::Mean {
                    values.mean()
                } else {
                    values.median()
                };
                FillValue::Number(value.context("column has no values")?)
            }
            MissingValueStrategy::MostFrequent => {
                let keys = text_values(series)?;
                let idx = most_frequent_index(&keys).context("column has no values")?;
                FillValue::from_row(series, idx)?.context("column has no values")?
            }
            MissingValueStrategy::Constant => FillValue::neutral_for(series),
        };

        let filled = fill_nulls(series, &fill)?;
        let mut updated = df.clone();
        updated.replace(name, filled)?;
        Ok((
            updated,
            format!("Filled '{}' with {}: {}", name, self.strategy, describe(&fill)),
        ))
    }
}

fn describe(fill: &FillValue) -> String {
    match fill {
        FillValue::Number(v) => format!("{v}"),
        FillValue::Integer(v) => format!("{v}"),
        FillValue::Text(v) => format!("'{v}'"),
        FillValue::Flag(v) => format!("{v}"),
        FillValue::Timestamp(v) => format!("{v}"),
    }
}
