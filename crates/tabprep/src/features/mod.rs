//! Feature engineering stages.
//!
//! - Categorical encoding (one-hot, label)
//! - Scaling of numeric columns
//! - Zero-variance and correlation pruning
//! - Principal component reduction

mod encoder;
mod reducer;
mod scaler;
mod selector;

pub use encoder::CategoricalEncoder;
pub use reducer::{DimensionalityReducer, PrincipalComponents, fit as fit_components};
pub use scaler::FeatureScaler;
pub use selector::FeatureSelector;
