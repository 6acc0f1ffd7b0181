//! Shared utilities for the preparation pipeline.
//!
//! Dtype classification, typed extraction of column values, and null
//! filling that keeps a column's dtype category intact.

use polars::prelude::*;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for preparation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    is_numeric_dtype(dtype) && !matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

/// Get the dtype category of a Series.
pub fn series_dtype_category(series: &Series) -> DtypeCategory {
    get_dtype_category(series.dtype())
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Borrow a column of `df` as a Series.
pub fn column_series<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<&'a Series> {
    Ok(df.column(name)?.as_materialized_series())
}

/// Column names of `df` as owned strings, in table order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Cell values of a numeric (or castable) Series as `f64`, nulls kept.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    Ok(float_series.f64()?.into_iter().collect())
}

/// Non-missing values of a numeric Series, in row order.
pub fn present_values(series: &Series) -> PolarsResult<Vec<f64>> {
    Ok(numeric_values(series)?.into_iter().flatten().collect())
}

/// Cell values rendered as text, nulls kept. Used as equality keys.
pub fn text_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Number of distinct non-missing values.
pub fn distinct_present(series: &Series) -> PolarsResult<usize> {
    series.drop_nulls().n_unique()
}

/// Fraction of missing cells, 0.0 for an empty column.
pub fn missing_fraction(series: &Series) -> f64 {
    if series.is_empty() {
        0.0
    } else {
        series.null_count() as f64 / series.len() as f64
    }
}

/// Share of missing cells in percent, 0.0 for an empty column.
pub fn missing_percentage(series: &Series) -> f64 {
    if series.is_empty() {
        0.0
    } else {
        series.null_count() as f64 * 100.0 / series.len() as f64
    }
}

/// Row index of the most frequent non-missing key.
///
/// Ties go to the value that reaches the maximum count first when the
/// column is scanned top to bottom.
pub fn most_frequent_index(keys: &[Option<String>]) -> Option<usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys.iter().flatten() {
        *counts.entry(key.as_str()).or_insert(0) += 1;
    }
    let max = counts.values().copied().max()?;

    let mut running: HashMap<&str, usize> = HashMap::new();
    let winner = keys.iter().flatten().find(|key| {
        let seen = running.entry(key.as_str()).or_insert(0);
        *seen += 1;
        *seen == max
    })?;
    keys.iter().position(|k| k.as_ref() == Some(winner))
}

/// Sorted distinct non-missing text values of a Series.
pub fn sorted_levels(series: &Series) -> PolarsResult<Vec<String>> {
    let mut levels: Vec<String> = text_values(series)?
        .into_iter()
        .flatten()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    levels.sort();
    Ok(levels)
}

/// `candidate`, or `candidate_1`, `candidate_2`, ... if already taken.
pub fn unique_column_name(taken: &HashSet<String>, candidate: &str) -> String {
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    (1..)
        .map(|i| format!("{candidate}_{i}"))
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Text the `constant` imputation writes into missing text cells. Type
/// coercion reads it back as missing.
pub const MISSING_TEXT: &str = "Unknown";

/// Replacement for missing cells, matched to the column's dtype category.
#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Number(f64),
    /// Exact value taken from an integer column.
    Integer(i64),
    Text(String),
    Flag(bool),
    /// Physical value of a temporal column (e.g. milliseconds since epoch).
    Timestamp(i64),
}

impl FillValue {
    /// The value of `series` at `idx` as a fill value.
    pub fn from_row(series: &Series, idx: usize) -> PolarsResult<Option<Self>> {
        let value = match series_dtype_category(series) {
            DtypeCategory::Numeric if is_integer_dtype(series.dtype()) => series
                .cast(&DataType::Int64)?
                .i64()?
                .get(idx)
                .map(FillValue::Integer),
            DtypeCategory::Numeric => numeric_values(series)?
                .get(idx)
                .copied()
                .flatten()
                .map(FillValue::Number),
            DtypeCategory::Boolean => series.bool()?.get(idx).map(FillValue::Flag),
            DtypeCategory::Datetime => series
                .to_physical_repr()
                .cast(&DataType::Int64)?
                .i64()?
                .get(idx)
                .map(FillValue::Timestamp),
            DtypeCategory::String | DtypeCategory::Other => text_values(series)?
                .get(idx)
                .cloned()
                .flatten()
                .map(FillValue::Text),
        };
        Ok(value)
    }

    /// Neutral value for a column: 0, [`MISSING_TEXT`], false, or the epoch.
    pub fn neutral_for(series: &Series) -> Self {
        match series_dtype_category(series) {
            DtypeCategory::Numeric => FillValue::Number(0.0),
            DtypeCategory::Boolean => FillValue::Flag(false),
            DtypeCategory::Datetime => FillValue::Timestamp(0),
            DtypeCategory::String | DtypeCategory::Other => {
                FillValue::Text(MISSING_TEXT.to_string())
            }
        }
    }
}

/// Fill null values of `series` with `fill`. Present cells are left as
/// they are.
///
/// Integer columns stay integer unless the fill value is fractional, in
/// which case the column becomes `Float64`. Temporal columns keep their
/// dtype. Other columns filled with text become `String`.
pub fn fill_nulls(series: &Series, fill: &FillValue) -> PolarsResult<Series> {
    let name = series.name().clone();
    let (target, replacement) = match fill {
        FillValue::Number(value) if is_integer_dtype(series.dtype()) && value.fract() != 0.0 => (
            series.cast(&DataType::Float64)?,
            Series::new(name, [*value]),
        ),
        FillValue::Number(value) => (
            series.clone(),
            Series::new(name, [*value]).strict_cast(series.dtype())?,
        ),
        FillValue::Integer(value) => (
            series.clone(),
            Series::new(name, [*value]).strict_cast(series.dtype())?,
        ),
        FillValue::Text(value) => (
            series.cast(&DataType::String)?,
            Series::new(name, [value.as_str()]),
        ),
        FillValue::Flag(value) => (series.clone(), Series::new(name, [*value])),
        FillValue::Timestamp(value) => (
            series.clone(),
            Series::new(name, [*value]).cast(series.dtype())?,
        ),
    };
    target.zip_with(&target.is_not_null(), &replacement)
}

// =============================================================================
// Tests
// =============================================================================
