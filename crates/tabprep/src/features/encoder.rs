//! Categorical encoding.
//!
//! Levels are the distinct non-missing values of a column in sorted text
//! order. One-hot drops the first level; label codes index into the
//! levels.

use crate::config::EncodingStrategy;
use crate::error::StageError;
use crate::pipeline::Diagnostics;
use crate::profiler::{ColumnKind, classify};
use crate::types::LabelEncoding;
use crate::utils::{column_names, column_series, sorted_levels, text_values, unique_column_name};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// How a single column gets encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    OneHot,
    Label,
}

/// Encodes categorical columns as indicators or integer codes.
#[derive(Debug, Clone, Copy)]
pub struct CategoricalEncoder {
    strategy: EncodingStrategy,
    max_onehot_cardinality: usize,
    keep_label_source: bool,
}

impl CategoricalEncoder {
    pub fn new(strategy: EncodingStrategy, max_onehot_cardinality: usize, keep_label_source: bool) -> Self {
        Self {
            strategy,
            max_onehot_cardinality,
            keep_label_source,
        }
    }

    fn encoding_for(&self, levels: usize) -> Encoding {
        match self.strategy {
            EncodingStrategy::OneHot => Encoding::OneHot,
            EncodingStrategy::Label => Encoding::Label,
            EncodingStrategy::Auto if levels < self.max_onehot_cardinality => Encoding::OneHot,
            EncodingStrategy::Auto => Encoding::Label,
        }
    }

    /// Encode every categorical column. New columns take the place of the
    /// column they were derived from.
    pub fn encode(
        &self,
        df: &DataFrame,
        diagnostics: &mut Diagnostics,
    ) -> Result<(DataFrame, Vec<LabelEncoding>), StageError> {
        let kinds = classify(df)?;
        let categorical: HashSet<String> =
            kinds.names_of(ColumnKind::Categorical).into_iter().collect();
        if categorical.is_empty() {
            return Ok((df.clone(), Vec::new()));
        }

        let mut taken: HashSet<String> = column_names(df).into_iter().collect();
        let mut columns: Vec<Column> = Vec::with_capacity(df.width());
        let mut encodings = Vec::new();

        for name in column_names(df) {
            let series = column_series(df, &name)?;
            if !categorical.contains(&name) {
                columns.push(series.clone().into());
                continue;
            }

            let levels = sorted_levels(series)?;
            match self.encoding_for(levels.len()) {
                Encoding::OneHot => {
                    let indicators = one_hot(series, &levels, &mut taken)?;
                    diagnostics.info(format!(
                        "One-hot encoded '{}' into {} columns.",
                        name,
                        indicators.len()
                    ));
                    columns.extend(indicators.into_iter().map(Column::from));
                }
                Encoding::Label => {
                    let encoded_name = unique_column_name(&taken, &format!("{name}_encoded"));
                    taken.insert(encoded_name.clone());
                    let codes = label_codes(series, &levels, &encoded_name)?;
                    if self.keep_label_source {
                        columns.push(series.clone().into());
                    }
                    columns.push(codes.into());
                    diagnostics.info(format!(
                        "Label encoded '{name}' into '{encoded_name}' with {} classes.",
                        levels.len()
                    ));
                    encodings.push(LabelEncoding {
                        column: name.clone(),
                        encoded_column: encoded_name,
                        classes: levels,
                    });
                }
            }
        }

        debug!("Encoded {} categorical columns", categorical.len());
        Ok((DataFrame::new(columns)?, encodings))
    }
}

/// Boolean indicator columns for every level but the first. Missing cells
/// stay missing.
fn one_hot(series: &Series, levels: &[String], taken: &mut HashSet<String>) -> PolarsResult<Vec<Series>> {
    let values = text_values(series)?;
    let mut indicators = Vec::with_capacity(levels.len().saturating_sub(1));

    for level in levels.iter().skip(1) {
        let indicator_name = unique_column_name(taken, &format!("{}_{}", series.name(), level));
        taken.insert(indicator_name.clone());
        let flags: Vec<Option<bool>> = values
            .iter()
            .map(|value| value.as_ref().map(|v| v == level))
            .collect();
        indicators.push(Series::new(indicator_name.into(), flags));
    }
    Ok(indicators)
}

/// Integer code of every cell, missing kept.
fn label_codes(series: &Series, levels: &[String], encoded_name: &str) -> PolarsResult<Series> {
    let index: HashMap<&str, i64> = levels
        .iter()
        .enumerate()
        .map(|(code, level)| (level.as_str(), code as i64))
        .collect();
    let codes: Vec<Option<i64>> = text_values(series)?
        .iter()
        .map(|value| value.as_deref().and_then(|v| index.get(v).copied()))
        .collect();
    Ok(Series::new(encoded_name.into(), codes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn colors() -> DataFrame {
        df![
            "id" => [1, 2, 3, 4],
            "color" => [Some("red"), Some("green"), Some("blue"), None],
            "size" => [1.5, 2.5, 3.5, 4.5],
        ]
        .unwrap()
    }

    fn names(df: &DataFrame) -> Vec<String> {
        column_names(df)
    }

    #[test]
    fn test_onehot_drops_first_level() {
        let mut diagnostics = Diagnostics::detached();
        let encoder = CategoricalEncoder::new(EncodingStrategy::OneHot, 10, true);

        let (df, encodings) = encoder.encode(&colors(), &mut diagnostics).unwrap();

        assert_eq!(names(&df), vec!["id", "color_green", "color_red", "size"]);
        assert!(encodings.is_empty());

        let green = df.column("color_green").unwrap().as_materialized_series().bool().unwrap().clone();
        let red = df.column("color_red").unwrap().as_materialized_series().bool().unwrap().clone();
        for row in 0..df.height() {
            let sum = [green.get(row), red.get(row)]
                .iter()
                .filter(|flag| **flag == Some(true))
                .count();
            assert!(sum <= 1);
        }
        assert_eq!(green.get(3), None);
    }

    #[test]
    fn test_label_codes_sorted_and_invertible() {
        let mut diagnostics = Diagnostics::detached();
        let encoder = CategoricalEncoder::new(EncodingStrategy::Label, 10, true);

        let (df, encodings) = encoder.encode(&colors(), &mut diagnostics).unwrap();

        assert_eq!(names(&df), vec!["id", "color", "color_encoded", "size"]);
        let encoding = &encodings[0];
        assert_eq!(encoding.classes, vec!["blue", "green", "red"]);

        let codes: Vec<Option<i64>> = df
            .column("color_encoded")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some(2), Some(1), Some(0), None]);
        assert_eq!(encoding.decode(2), Some("red"));
    }

    #[test]
    fn test_label_without_source() {
        let mut diagnostics = Diagnostics::detached();
        let encoder = CategoricalEncoder::new(EncodingStrategy::Label, 10, false);

        let (df, _) = encoder.encode(&colors(), &mut diagnostics).unwrap();

        assert_eq!(names(&df), vec!["id", "color_encoded", "size"]);
    }

    #[test]
    fn test_auto_threshold() {
        let mut diagnostics = Diagnostics::detached();

        let (df, encodings) = CategoricalEncoder::new(EncodingStrategy::Auto, 3, true)
            .encode(&colors(), &mut diagnostics)
            .unwrap();
        assert_eq!(encodings.len(), 1);
        assert!(df.column("color_encoded").is_ok());

        let (df, encodings) = CategoricalEncoder::new(EncodingStrategy::Auto, 4, true)
            .encode(&colors(), &mut diagnostics)
            .unwrap();
        assert!(encodings.is_empty());
        assert!(df.column("color_red").is_ok());
    }

    #[test]
    fn test_constant_columns_not_encoded() {
        let df = df!["c" => ["x", "x", "x"], "n" => [1, 2, 3]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let (encoded, _) = CategoricalEncoder::new(EncodingStrategy::OneHot, 10, true)
            .encode(&df, &mut diagnostics)
            .unwrap();

        assert!(encoded.equals(&df));
        assert!(diagnostics.events().is_empty());
    }

    #[test]
    fn test_indicator_name_collision() {
        let df = df![
            "t" => ["a", "b", "a"],
            "t_b" => [1, 2, 3],
        ]
        .unwrap();
        let mut diagnostics = Diagnostics::detached();

        let (encoded, _) = CategoricalEncoder::new(EncodingStrategy::OneHot, 10, true)
            .encode(&df, &mut diagnostics)
            .unwrap();

        assert_eq!(names(&encoded), vec!["t_b_1", "t_b"]);
    }
}
