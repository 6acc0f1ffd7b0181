//! Data cleaning module for preprocessing datasets.
//!
//! This module provides functionality for:
//! - Normalizing column names
//! - Trimming text values and dropping empty columns
//! - Removing duplicate rows
//! - Coercing text columns to datetime or numeric types

mod converters;
mod duplicates;
mod sanitizers;
mod type_coercer;

pub use duplicates::{DuplicateResolver, count_duplicate_rows};
pub use type_coercer::TypeCoercer;

pub(crate) use converters::parse_datetime_ms;

use crate::pipeline::Diagnostics;
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Basic cleaning applied to every table before the optional stages.
pub struct BasicCleaner;

impl BasicCleaner {
    /// Normalize column names: trimmed, lower-case, word characters only,
    /// whitespace replaced by underscores, unique.
    pub fn normalize_names(df: DataFrame) -> PolarsResult<DataFrame> {
        sanitizers::normalize_column_names(df)
    }

    /// Trim text values and drop entirely-missing columns.
    ///
    /// On failure the table is returned as received and an error is
    /// recorded.
    pub fn clean_values(df: DataFrame, diagnostics: &mut Diagnostics) -> DataFrame {
        match Self::try_clean_values(df.clone(), diagnostics) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                diagnostics.error(format!("Value cleanup failed: {e:#}"));
                df
            }
        }
    }

    fn try_clean_values(df: DataFrame, diagnostics: &mut Diagnostics) -> Result<DataFrame> {
        let (df, trimmed) = sanitizers::trim_text_values(df)?;
        if trimmed > 0 {
            debug!("Trimmed whitespace from {} values", trimmed);
        }

        let empty = sanitizers::all_missing_columns(&df);
        if empty.is_empty() {
            return Ok(df);
        }

        let df = df.drop_many(empty.iter().map(String::as_str));
        for name in &empty {
            diagnostics.info(format!("Dropped column '{name}' with no values."));
        }
        Ok(df)
    }
}
