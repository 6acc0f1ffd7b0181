use crate::cleaner::parse_datetime_ms;
use crate::types::{ValidationIssue, ValidationIssueKind};
use crate::profiler::statistics;
use crate::utils::{DtypeCategory, series_dtype_category};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Share of present values that must parse as dates before a text column
/// is held to the date rule.
pub const DATE_MAJORITY: f64 = 0.5;

pub struct DataValidator;

impl DataValidator {
    /// Check every column, in table order.
    pub fn validate(df: &DataFrame) -> Result<Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let issue = match series_dtype_category(series) {
                DtypeCategory::Numeric => Self::negative_values(series)?,
                DtypeCategory::String => Self::invalid_dates(series)?,
                _ => None,
            };
            issues.extend(issue);
        }

        debug!("Validation found {} issues", issues.len());
        Ok(issues)
    }

    fn negative_values(series: &Series) -> Result<Option<ValidationIssue>> {
        let count = statistics::float_values(series)?.lt(0.0).num_trues();
        Ok((count > 0).then(|| ValidationIssue {
            column: series.name().to_string(),
            kind: ValidationIssueKind::NegativeValues,
            count,
        }))
    }

    fn invalid_dates(series: &Series) -> Result<Option<ValidationIssue>> {
        let text = series.cast(&DataType::String)?;
        let values: Vec<&str> = text.str()?.into_iter().flatten().collect();
        if values.is_empty() {
            return Ok(None);
        }

        let parsed = values
            .iter()
            .filter(|v| parse_datetime_ms(v).is_some())
            .count();
        if (parsed as f64) / (values.len() as f64) <= DATE_MAJORITY {
            return Ok(None);
        }

        let count = values.len() - parsed;
        Ok((count > 0).then(|| ValidationIssue {
            column: series.name().to_string(),
            kind: ValidationIssueKind::InvalidDates,
            count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_values() {
        let df = df![
            "price" => [Some(10.0), Some(-2.0), None, Some(-1.0)],
            "qty" => [1, 2, 3, 4],
        ]
        .unwrap();

        let issues = DataValidator::validate(&df).unwrap();

        assert_eq!(
            issues,
            vec![ValidationIssue {
                column: "price".to_string(),
                kind: ValidationIssueKind::NegativeValues,
                count: 2,
            }]
        );
    }

    #[test]
    fn test_invalid_dates_in_mostly_date_column() {
        let df = df![
            "joined" => ["2024-01-01", "2024-02-30", "2024-03-01", "2024-04-01"],
            "name" => ["ann", "bob", "2024-01-01", "cid"],
        ]
        .unwrap();

        let issues = DataValidator::validate(&df).unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "joined");
        assert_eq!(issues[0].kind, ValidationIssueKind::InvalidDates);
        assert_eq!(issues[0].count, 1);
    }

    #[test]
    fn test_clean_table_has_no_issues() {
        let df = df![
            "a" => [1, 2, 3],
            "b" => ["x", "y", "z"],
        ]
        .unwrap();
        assert!(DataValidator::validate(&df).unwrap().is_empty());
    }
}
