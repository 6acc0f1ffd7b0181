//! Report generation module.
//!
//! A [`RunReport`] gathers the before/after profiles of a run, its
//! diagnostics, label encodings and validation findings.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabprep::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build(&config, &input_df, &outcome)?
//!     .with_files("data/sales.csv", Some("output/sales.csv".to_string()));
//!
//! // Print as JSON
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! // Or write to file
//! ReportGenerator::new("output").write_report_to_file(&report, "sales")?;
//! ```

mod generator;

pub use generator::{ReportGenerator, RunReport};
