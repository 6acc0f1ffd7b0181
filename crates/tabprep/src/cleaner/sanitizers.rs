//! Column name normalization and value sanitization.

use anyhow::Result;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("Invalid regex: non-word characters"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s").expect("Invalid regex: whitespace"));

/// Normalize one column name: trim, lower-case, strip characters that are
/// neither word characters nor whitespace, then turn whitespace into
/// underscores.
pub(crate) fn normalize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    WHITESPACE.replace_all(&stripped, "_").into_owned()
}

/// Normalized, unique names for `names`, in order.
///
/// Names that normalize to nothing become `column_{position}`. Collisions
/// get `_1`, `_2`, ... suffixes.
pub(crate) fn normalized_names(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let mut name = normalize_name(raw);
            if name.is_empty() {
                name = format!("column_{idx}");
            }
            let name = crate::utils::unique_column_name(&taken, &name);
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Rename every column of `df` to its normalized name.
pub(crate) fn normalize_column_names(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let current = crate::utils::column_names(&df);
    let renamed = normalized_names(&current);
    if renamed != current {
        debug!("Normalized column names: {:?} -> {:?}", current, renamed);
        df.set_column_names(renamed.iter().map(String::as_str))?;
    }
    Ok(df)
}

/// Trim surrounding whitespace from every text value.
///
/// Returns the table and the number of values that changed.
pub(crate) fn trim_text_values(mut df: DataFrame) -> Result<(DataFrame, usize)> {
    let mut changed = 0;

    for col_name in crate::utils::column_names(&df) {
        let series = df.column(&col_name)?.as_materialized_series();
        if series.dtype() != &DataType::String {
            continue;
        }

        let mut column_changed = 0;
        let trimmed: Vec<Option<String>> = series
            .str()?
            .into_iter()
            .map(|value| {
                value.map(|v| {
                    let t = v.trim();
                    if t.len() != v.len() {
                        column_changed += 1;
                    }
                    t.to_string()
                })
            })
            .collect();

        if column_changed > 0 {
            changed += column_changed;
            df.replace(&col_name, Series::new(col_name.as_str().into(), trimmed))?;
        }
    }

    Ok((df, changed))
}

/// Names of columns with no present value. Empty for a table without rows.
pub(crate) fn all_missing_columns(df: &DataFrame) -> Vec<String> {
    if df.height() == 0 {
        return Vec::new();
    }
    df.get_columns()
        .iter()
        .map(|col| col.as_materialized_series())
        .filter(|series| series.null_count() == df.height())
        .map(|series| series.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Customer ID "), "customer_id");
        assert_eq!(normalize_name("Price ($)"), "price_");
        assert_eq!(normalize_name("Über-Größe"), "übergröße");
        assert_eq!(normalize_name("a\tb"), "a_b");
        assert_eq!(normalize_name("already_clean"), "already_clean");
    }

    #[test]
    fn test_normalize_name_idempotent() {
        for raw in ["  Customer ID ", "Price ($)", "# of items", "x__y", "Ünïcode Näme"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_normalized_names_collisions_and_empty() {
        let names: Vec<String> = ["Name", "name ", "NAME!", "$$", "name_1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            normalized_names(&names),
            vec!["name", "name_1", "name_2", "column_3", "name_1_1"]
        );
    }

    #[test]
    fn test_normalized_names_stable_on_clean_input() {
        let names: Vec<String> = ["name", "name_1", "column_2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(normalized_names(&names), names);
    }

    #[test]
    fn test_trim_text_values() {
        let df = df![
            "city" => [Some("  Paris "), Some("Lyon"), None],
            "n" => [1, 2, 3],
        ]
        .unwrap();

        let (df, changed) = trim_text_values(df).unwrap();
        assert_eq!(changed, 1);
        let city = df.column("city").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(city.get(0), Some("Paris"));
        assert_eq!(city.get(2), None);
    }

    #[test]
    fn test_all_missing_columns() {
        let df = df![
            "empty" => [None::<i32>, None],
            "full" => [Some(1), None],
        ]
        .unwrap();
        assert_eq!(all_missing_columns(&df), vec!["empty"]);

        let no_rows = df.head(Some(0));
        assert!(all_missing_columns(&no_rows).is_empty());
    }
}
