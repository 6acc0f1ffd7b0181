//! Outlier handling module.
//!
//! Values outside the bounds of a numeric column are clipped to them.

use crate::config::OutlierStrategy;
use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use crate::profiler::{ColumnKind, classify, statistics};
use crate::utils::{column_series, is_integer_dtype};
use polars::prelude::*;
use tracing::debug;

/// Multiplier of the inter-quartile range for the `iqr` bounds.
const IQR_FACTOR: f64 = 1.5;

/// Standard deviations from the mean for the `zscore` bounds.
const ZSCORE_LIMIT: f64 = 3.0;

/// Clips outliers in numeric columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlierHandler {
    strategy: OutlierStrategy,
}

impl OutlierHandler {
    pub fn new(strategy: OutlierStrategy) -> Self {
        Self { strategy }
    }

    /// Lower and upper bounds for the present values of a column, or
    /// `None` when it has none.
    ///
    /// Bounds collapse to a single point when the spread is zero, so a
    /// column whose quartiles coincide still has its stragglers clipped.
    pub fn bounds(&self, values: &Float64Chunked) -> PolarsResult<Option<(f64, f64)>> {
        let bounds = match self.strategy {
            OutlierStrategy::Iqr => statistics::quartiles(values)?.map(|(q1, _, q3)| {
                let iqr = q3 - q1;
                (q1 - IQR_FACTOR * iqr, q3 + IQR_FACTOR * iqr)
            }),
            OutlierStrategy::ZScore => values
                .mean()
                .zip(values.std(1))
                .map(|(mean, std)| (mean - ZSCORE_LIMIT * std, mean + ZSCORE_LIMIT * std)),
        };
        Ok(bounds)
    }

    pub fn handle(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let mut df = df.clone();
        let kinds = classify(&df)?;

        for name in kinds.names_of(ColumnKind::Numeric) {
            let series = column_series(&df, &name)?;
            let values = statistics::float_values(series)?;
            let Some((lower, upper)) = self.bounds(&values)? else {
                debug!("Column '{}' has no values, skipping", name);
                continue;
            };

            let keep_lower = values.gt_eq(lower).fill_null_with_values(true)?;
            let keep_upper = values.lt_eq(upper).fill_null_with_values(true)?;
            let outliers = values.len() - (&keep_lower & &keep_upper).num_trues();
            if outliers == 0 {
                continue;
            }
            diagnostics.warn(format!("Found {outliers} outliers in column '{name}'."));

            let clipped = clip(series, (&keep_lower, lower), (&keep_upper, upper))?;
            df.replace(&name, clipped)?;
            diagnostics.info(format!(
                "Clipped {outliers} outliers in column '{name}' to [{lower}, {upper}]."
            ));
        }

        Ok(df)
    }
}

/// Replace the cells outside each mask by its bound. Cells inside both
/// masks keep their native value; integer columns stay integer unless a
/// bound is fractional. A side with nothing to replace is not touched, so
/// an unsigned column never needs a negative bound.
fn clip(
    series: &Series,
    (keep_lower, lower): (&BooleanChunked, f64),
    (keep_upper, upper): (&BooleanChunked, f64),
) -> PolarsResult<Series> {
    let integral = lower.fract() == 0.0 && upper.fract() == 0.0;
    let mut clipped = if is_integer_dtype(series.dtype()) && !integral {
        series.cast(&DataType::Float64)?
    } else {
        series.clone()
    };

    for (keep, bound) in [(keep_lower, lower), (keep_upper, upper)] {
        if keep.num_trues() == keep.len() {
            continue;
        }
        let bound = Series::new(series.name().clone(), [bound]).strict_cast(clipped.dtype())?;
        clipped = clipped.zip_with(keep, &bound)?;
    }
    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Severity;
    use crate::utils::numeric_values;

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        numeric_values(column_series(df, name).unwrap()).unwrap()
    }

    fn floats(values: &[f64]) -> Float64Chunked {
        Float64Chunked::from_slice("x".into(), values)
    }

    #[test]
    fn test_iqr_bounds() {
        let handler = OutlierHandler::new(OutlierStrategy::Iqr);
        assert_eq!(
            handler.bounds(&floats(&[1.0, 2.0, 3.0, 4.0, 100.0])).unwrap(),
            Some((-1.0, 7.0))
        );
        assert_eq!(handler.bounds(&floats(&[5.0, 5.0, 5.0])).unwrap(), Some((5.0, 5.0)));
        assert_eq!(handler.bounds(&floats(&[])).unwrap(), None);
    }

    #[test]
    fn test_iqr_clips_high_value() {
        let df = df!["x" => [1, 2, 3, 4, 100]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::Iqr)
            .handle(&df, &mut diagnostics)
            .unwrap();

        assert_eq!(
            values(&result, "x"),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(7.0)]
        );
        assert_eq!(result.column("x").unwrap().dtype(), &DataType::Int32);

        let events = diagnostics.events();
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].message, "Found 1 outliers in column 'x'.");
        assert_eq!(events[1].severity, Severity::Info);
        assert_eq!(events[1].message, "Clipped 1 outliers in column 'x' to [-1, 7].");
    }

    #[test]
    fn test_iqr_zero_spread_clips_straggler() {
        // Q1 == Q3 == 1, so both bounds are 1
        let df = df!["x" => [1i64, 1, 1, 1, 1, 1, 100]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::Iqr)
            .handle(&df, &mut diagnostics)
            .unwrap();

        let x: Vec<Option<i64>> = result
            .column("x")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(x, vec![Some(1); 7]);
        assert_eq!(diagnostics.events()[0].message, "Found 1 outliers in column 'x'.");
        assert_eq!(
            diagnostics.events()[1].message,
            "Clipped 1 outliers in column 'x' to [1, 1]."
        );
    }

    #[test]
    fn test_clip_keeps_large_integers_exact() {
        // Above 2^53 odd integers have no exact f64 form
        let big = 1i64 << 53;
        let df = df!["x" => [big + 1, big + 2, big + 3, big + 4, big + 1000]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::Iqr)
            .handle(&df, &mut diagnostics)
            .unwrap();

        let column = result.column("x").unwrap();
        assert_eq!(column.dtype(), &DataType::Int64);
        let x: Vec<Option<i64>> = column.i64().unwrap().into_iter().collect();
        // Upper bound big + 7 rounds to big + 8 in f64
        assert_eq!(
            x,
            vec![Some(big + 1), Some(big + 2), Some(big + 3), Some(big + 4), Some(big + 8)]
        );
    }

    #[test]
    fn test_unsigned_column_with_negative_lower_bound() {
        // Bounds are [-1, 7]; no cell lies below the lower one
        let df = df!["x" => [1u8, 2, 3, 4, 100]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::Iqr)
            .handle(&df, &mut diagnostics)
            .unwrap();

        let column = result.column("x").unwrap();
        assert_eq!(column.dtype(), &DataType::UInt8);
        let x: Vec<Option<u8>> = column.u8().unwrap().into_iter().collect();
        assert_eq!(x, vec![Some(1), Some(2), Some(3), Some(4), Some(7)]);
    }

    #[test]
    fn test_fractional_bound_turns_integer_column_float() {
        let data: Vec<i32> = (1..=20).chain([10_000]).collect();
        let df = df!["x" => data].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::ZScore)
            .handle(&df, &mut diagnostics)
            .unwrap();

        assert_eq!(result.column("x").unwrap().dtype(), &DataType::Float64);
        assert_eq!(values(&result, "x")[0], Some(1.0));
    }

    #[test]
    fn test_zscore_clips_extreme_value() {
        let mut data = vec![Some(10.0); 20];
        data.push(Some(1000.0));
        data.push(None);
        let df = df!["x" => data].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::new(OutlierStrategy::ZScore)
            .handle(&df, &mut diagnostics)
            .unwrap();

        // 21 present values: mean = 1200 / 21, sample variance = 990^2 / 21
        let mean = 1200.0 / 21.0;
        let std = (990.0f64 * 990.0 / 21.0).sqrt();
        let upper = mean + 3.0 * std;

        let clipped = values(&result, "x");
        assert!((clipped[20].unwrap() - upper).abs() < 1e-9);
        assert_eq!(clipped[21], None);
        assert_eq!(clipped[..20], vec![Some(10.0); 20][..]);

        let events = diagnostics.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].message, "Found 1 outliers in column 'x'.");
        assert_eq!(events[1].severity, Severity::Info);
        assert!(events[1].message.starts_with("Clipped 1 outliers in column 'x' to ["));
    }

    #[test]
    fn test_constant_and_text_columns_untouched() {
        let df = df![
            "same" => [3.0, 3.0, 3.0, 3.0],
            "name" => ["a", "b", "c", "zzzzzzzz"],
        ]
        .unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = OutlierHandler::default().handle(&df, &mut diagnostics).unwrap();

        assert!(result.equals(&df));
        assert!(diagnostics.events().is_empty());
    }
}
