//! Type coercion for text columns holding dates or numbers.

use super::converters::{string_to_datetime, string_to_numeric};
use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use crate::utils::{MISSING_TEXT, column_series};
use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::debug;

/// Converts text columns to datetime or numeric when every value parses.
///
/// [`MISSING_TEXT`] cells count as missing: they do not block a
/// conversion and become null in the converted column.
pub struct TypeCoercer;

impl TypeCoercer {
    /// Columns eligible for coercion: text and categorical columns.
    ///
    /// Numeric, datetime and boolean columns are never candidates.
    pub fn candidates(df: &DataFrame) -> PolarsResult<Vec<String>> {
        let mut names = Vec::new();
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            if matches!(series.dtype(), DataType::String | DataType::Categorical(_, _)) {
                names.push(series.name().to_string());
            }
        }
        Ok(names)
    }

    /// Try datetime, then numeric, on every candidate column.
    pub fn coerce(df: &DataFrame, candidates: &[String], diagnostics: &mut Diagnostics) -> StageResult {
        let mut df = df.clone();
        for name in candidates {
            if let Some((converted, target)) = Self::coerce_column(&df, name)? {
                df.replace(name, converted)?;
                diagnostics.info(format!("Converted column '{name}' to {target}."));
            }
        }
        Ok(df)
    }

    fn coerce_column(df: &DataFrame, name: &str) -> Result<Option<(Series, &'static str)>> {
        let text = column_series(df, name)
            .with_context(|| format!("Column '{name}' not found"))?
            .cast(&DataType::String)?;
        let series = Self::blank_missing_text(&text)?;

        if let Some(converted) = string_to_datetime(&series)? {
            return Ok(Some((converted, "datetime")));
        }
        if let Some(converted) = string_to_numeric(&series)? {
            return Ok(Some((converted, "numeric")));
        }
        debug!("Column '{}' left as text", name);
        Ok(None)
    }

    /// `text` with [`MISSING_TEXT`] cells set to null.
    fn blank_missing_text(text: &Series) -> PolarsResult<Series> {
        let filled = text.str()?.equal(MISSING_TEXT).fill_null_with_values(false)?;
        if filled.num_trues() == 0 {
            return Ok(text.clone());
        }
        debug!(
            "Column '{}' has {} '{}' cells, read as missing",
            text.name(),
            filled.num_trues(),
            MISSING_TEXT
        );
        let null = Series::full_null(text.name().clone(), 1, &DataType::String);
        text.zip_with(&!&filled, &null)
    }
}
