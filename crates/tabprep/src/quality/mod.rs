//! Data validation module.
//!
//! Rule-based checks over a prepared table. Findings are reported, never
//! raised.

mod validator;

pub use validator::{DATE_MAJORITY, DataValidator};
