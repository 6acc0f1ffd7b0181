//! Imputation module for handling missing values.
//!
//! Strategies: drop rows, mean, median, most frequent value, or a
//! neutral constant per column kind.

mod statistical;

pub use statistical::MissingValueImputer;
