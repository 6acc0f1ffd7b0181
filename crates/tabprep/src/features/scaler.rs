//! Feature scaling for numeric columns.

use crate::config::ScalingStrategy;
use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use crate::profiler::{ColumnKind, classify, statistics};
use crate::utils::column_series;
use polars::prelude::*;

/// Center and spread of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Rescales numeric columns in place. Output columns are `Float64` with
/// missing cells kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureScaler {
    strategy: ScalingStrategy,
}

impl FeatureScaler {
    pub fn new(strategy: ScalingStrategy) -> Self {
        Self { strategy }
    }

    fn params(&self, values: &Float64Chunked) -> PolarsResult<Option<ScalerParams>> {
        let params = match self.strategy {
            ScalingStrategy::Standard => values.mean().zip(values.std(0)),
            ScalingStrategy::Robust => statistics::quartiles(values)?
                .map(|(q1, median, q3)| (median, q3 - q1)),
            ScalingStrategy::MinMax => values
                .min()
                .zip(values.max())
                .map(|(min, max)| (min, max - min)),
        };
        Ok(params.map(|(center, scale)| ScalerParams { center, scale }))
    }

    /// Scale every numeric and constant column. A column with no spread
    /// becomes all zeros.
    pub fn scale(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let mut df = df.clone();
        let kinds = classify(&df)?;

        let mut scaled = 0;
        for (name, kind) in kinds.iter() {
            let series = column_series(&df, name)?;
            let is_numeric = match kind {
                ColumnKind::Numeric => true,
                ColumnKind::Constant => crate::utils::is_numeric_dtype(series.dtype()),
                _ => false,
            };
            if !is_numeric {
                continue;
            }

            let values = statistics::float_values(series)?;
            let Some(params) = self.params(&values)? else {
                continue;
            };
            let rescaled = if params.scale == 0.0 {
                values.apply_values(|_| 0.0)
            } else {
                values.apply_values(|x| (x - params.center) / params.scale)
            };
            df.replace(name, rescaled.into_series())?;
            scaled += 1;
        }

        diagnostics.info(format!("Scaled {} columns using {} scaling.", scaled, self.strategy));
        Ok(df)
    }
}
