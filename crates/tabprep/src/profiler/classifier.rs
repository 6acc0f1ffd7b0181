//! Column classification.
//!
//! Kinds are a pure view of a table. They are never stored with the data
//! and are recomputed whenever a stage needs them.

use crate::utils::{DtypeCategory, distinct_present, series_dtype_category};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Declared numeric dtype
    Numeric,
    /// Text, boolean and anything else
    Categorical,
    /// Date, datetime or time dtype
    Datetime,
    /// Exactly one distinct non-missing value
    Constant,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Constant => "constant",
        })
    }
}

/// Kinds of every column of a table, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnKinds {
    entries: Vec<(String, ColumnKind)>,
}

impl ColumnKinds {
    pub fn get(&self, name: &str) -> Option<ColumnKind> {
        self.entries
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, kind)| *kind)
    }

    /// Columns of `kind`, in table order.
    pub fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Kind of a single column.
///
/// Constant wins over the dtype: a numeric column with one distinct value
/// is constant, not numeric. Columns with no present values fall back to
/// their dtype.
pub fn column_kind(series: &Series) -> PolarsResult<ColumnKind> {
    if distinct_present(series)? == 1 {
        return Ok(ColumnKind::Constant);
    }
    Ok(match series_dtype_category(series) {
        DtypeCategory::Numeric => ColumnKind::Numeric,
        DtypeCategory::Datetime => ColumnKind::Datetime,
        DtypeCategory::Boolean | DtypeCategory::String | DtypeCategory::Other => {
            ColumnKind::Categorical
        }
    })
}

/// Classify every column of `df`.
pub fn classify(df: &DataFrame) -> PolarsResult<ColumnKinds> {
    let entries = df
        .get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            Ok((series.name().to_string(), column_kind(series)?))
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(ColumnKinds { entries })
}
