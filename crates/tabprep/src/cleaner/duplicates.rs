//! Duplicate row resolution.
//!
//! Two rows are duplicates when every column holds the same value, with
//! missing equal to missing. Row order is preserved.

use crate::config::DuplicateStrategy;
use crate::error::StageResult;
use crate::pipeline::Diagnostics;
use polars::prelude::*;
use tracing::debug;

impl From<DuplicateStrategy> for UniqueKeepStrategy {
    fn from(strategy: DuplicateStrategy) -> Self {
        match strategy {
            DuplicateStrategy::First => UniqueKeepStrategy::First,
            DuplicateStrategy::Last => UniqueKeepStrategy::Last,
            DuplicateStrategy::All => UniqueKeepStrategy::None,
        }
    }
}

/// Rows of `df` that survive `strategy`, in their original order.
fn deduplicate(df: &DataFrame, strategy: DuplicateStrategy) -> PolarsResult<DataFrame> {
    if df.width() == 0 {
        return Ok(df.clone());
    }
    df.unique_stable(None, strategy.into(), None)
}

/// Number of rows that repeat an earlier row.
pub fn count_duplicate_rows(df: &DataFrame) -> PolarsResult<usize> {
    Ok(df.height() - deduplicate(df, DuplicateStrategy::First)?.height())
}

/// Removes duplicate rows according to a [`DuplicateStrategy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver {
    strategy: DuplicateStrategy,
}

impl DuplicateResolver {
    pub fn new(strategy: DuplicateStrategy) -> Self {
        Self { strategy }
    }

    pub fn resolve(&self, df: &DataFrame, diagnostics: &mut Diagnostics) -> StageResult {
        let result = deduplicate(df, self.strategy)?;
        let removed = df.height() - result.height();

        debug!(
            "Duplicate strategy '{}' kept {} of {} rows",
            self.strategy,
            result.height(),
            df.height()
        );
        diagnostics.info(format!("Removed {removed} duplicate rows."));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn df_with_duplicates() -> DataFrame {
        df![
            "id" => [1, 2, 1, 3],
            "name" => [Some("a"), Some("b"), Some("a"), None],
        ]
        .unwrap()
    }

    fn ids(df: &DataFrame) -> Vec<Option<i32>> {
        df.column("id")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_keep_first() {
        let df = df![
            "a" => [1, 1, 2],
            "b" => ["x", "x", "y"],
        ]
        .unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = DuplicateResolver::new(DuplicateStrategy::First)
            .resolve(&df, &mut diagnostics)
            .unwrap();

        assert_eq!(result.height(), 2);
        assert_eq!(diagnostics.events()[0].message, "Removed 1 duplicate rows.");
    }

    #[test]
    fn test_keep_last_preserves_order() {
        let df = df![
            "k" => ["x", "y", "x"],
            "id" => [1, 2, 1],
            "pos" => [0, 1, 0],
        ]
        .unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = DuplicateResolver::new(DuplicateStrategy::Last)
            .resolve(&df, &mut diagnostics)
            .unwrap();

        let keys: Vec<Option<&str>> = result
            .column("k")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(keys, vec![Some("y"), Some("x")]);
        assert_eq!(diagnostics.events()[0].message, "Removed 1 duplicate rows.");
    }

    #[test]
    fn test_drop_all_duplicates() {
        let df = df_with_duplicates();
        let mut diagnostics = Diagnostics::detached();

        let result = DuplicateResolver::new(DuplicateStrategy::All)
            .resolve(&df, &mut diagnostics)
            .unwrap();

        assert_eq!(ids(&result), vec![Some(2), Some(3)]);
        assert_eq!(diagnostics.events()[0].message, "Removed 2 duplicate rows.");
    }

    #[test]
    fn test_missing_equals_missing() {
        let df = df![
            "a" => [None, None, Some(1)],
            "b" => [Some("x"), Some("x"), Some("x")],
        ]
        .unwrap();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 1);
        assert_eq!(count_duplicate_rows(&df_with_duplicates()).unwrap(), 1);
    }

    #[test]
    fn test_empty_table_has_no_duplicates() {
        let df = DataFrame::empty();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 0);
    }

    #[test]
    fn test_no_duplicates_still_reports() {
        let df = df!["a" => [1, 2, 3]].unwrap();
        let mut diagnostics = Diagnostics::detached();

        let result = DuplicateResolver::default()
            .resolve(&df, &mut diagnostics)
            .unwrap();

        assert!(result.equals(&df));
        assert_eq!(diagnostics.events()[0].message, "Removed 0 duplicate rows.");
    }
}
