//! Configuration types for the preparation pipeline.
//!
//! Every optional stage has an enable flag and a closed strategy enum.
//! Configurations are built with [`PipelineConfig::builder()`] or loaded
//! from JSON, and are validated before the first stage runs. A run never
//! reads configuration from anywhere else.

use crate::error::PipelineError;
use crate::pipeline::PipelineStage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Implements `Display` and `FromStr` for a strategy enum using its
/// snake_case config name.
macro_rules! strategy_names {
    ($ty:ident, $stage:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every strategy of this stage, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Name used in configuration files and on the command line.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(ConfigValidationError::UnknownStrategy {
                        stage: $stage.to_string(),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// Which row survives when several rows are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Keep the first occurrence
    #[default]
    First,
    /// Keep the last occurrence
    Last,
    /// Drop every row that has a duplicate, originals included
    All,
}

strategy_names!(DuplicateStrategy, "duplicates", {
    First => "first",
    Last => "last",
    All => "all",
});

/// How missing cells are resolved, column by column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    /// Drop rows missing a value in the column
    Drop,
    /// Fill with the column mean (numeric columns only)
    Mean,
    /// Fill with the column median (numeric columns only)
    #[default]
    Median,
    /// Fill with the most frequent value
    MostFrequent,
    /// Fill with 0 for numeric columns, a neutral value otherwise
    Constant,
}

strategy_names!(MissingValueStrategy, "missing_values", {
    Drop => "drop",
    Mean => "mean",
    Median => "median",
    MostFrequent => "most_frequent",
    Constant => "constant",
});

/// Bounds used to clip numeric outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutlierStrategy {
    /// Q1 - 1.5*IQR, Q3 + 1.5*IQR
    #[default]
    #[serde(rename = "iqr")]
    Iqr,
    /// mean +/- 3 standard deviations
    #[serde(rename = "zscore")]
    ZScore,
}

strategy_names!(OutlierStrategy, "outliers", {
    Iqr => "iqr",
    ZScore => "zscore",
});

/// How categorical columns become numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EncodingStrategy {
    /// One-hot below the cardinality threshold, label encoding otherwise
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// k-1 indicator columns, first level dropped
    #[serde(rename = "onehot")]
    OneHot,
    /// Integer codes in `{column}_encoded`
    #[serde(rename = "label")]
    Label,
}

strategy_names!(EncodingStrategy, "encoding", {
    Auto => "auto",
    OneHot => "onehot",
    Label => "label",
});

/// Rescaling applied to numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ScalingStrategy {
    /// (x - mean) / std
    #[default]
    #[serde(rename = "standard")]
    Standard,
    /// (x - median) / IQR
    #[serde(rename = "robust")]
    Robust,
    /// (x - min) / (max - min)
    #[serde(rename = "minmax")]
    MinMax,
}

strategy_names!(ScalingStrategy, "scaling", {
    Standard => "standard",
    Robust => "robust",
    MinMax => "minmax",
});

/// Configuration for one pipeline run.
///
/// Cleaning and type coercion are mandatory and have no flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the duplicate resolver. Default: true
    pub remove_duplicates: bool,
    /// Default: first
    pub duplicate_strategy: DuplicateStrategy,

    /// Run the missing-value imputer. Default: true
    pub handle_missing: bool,
    /// Default: median
    pub missing_strategy: MissingValueStrategy,

    /// Run the outlier handler. Default: true
    pub handle_outliers: bool,
    /// Default: iqr
    pub outlier_strategy: OutlierStrategy,

    /// Run the categorical encoder. Default: true
    pub encode_categoricals: bool,
    /// Default: auto
    pub encoding_strategy: EncodingStrategy,

    /// Run the feature scaler. Default: true
    pub scale_features: bool,
    /// Default: standard
    pub scaling_strategy: ScalingStrategy,

    /// Run the feature selector. Default: false
    pub select_features: bool,

    /// Run the dimensionality reducer. Default: false
    pub reduce_dimensions: bool,

    /// `auto` encoding uses one-hot for columns with fewer distinct
    /// values than this. Default: 10
    pub onehot_max_cardinality: usize,

    /// Keep the source column next to `{column}_encoded`. Default: true
    pub keep_label_source: bool,

    /// Absolute correlation above which the later column of a pair is
    /// dropped, in (0, 1]. Default: 0.95
    pub correlation_threshold: f64,

    /// Cumulative explained variance kept by PCA, in (0, 1]. Default: 0.95
    pub pca_variance: f64,

    /// Missing fraction above which the imputer warns, in [0, 1].
    /// Default: 0.5
    pub missing_warning_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            duplicate_strategy: DuplicateStrategy::default(),
            handle_missing: true,
            missing_strategy: MissingValueStrategy::default(),
            handle_outliers: true,
            outlier_strategy: OutlierStrategy::default(),
            encode_categoricals: true,
            encoding_strategy: EncodingStrategy::default(),
            scale_features: true,
            scaling_strategy: ScalingStrategy::default(),
            select_features: false,
            reduce_dimensions: false,
            onehot_max_cardinality: 10,
            keep_label_source: true,
            correlation_threshold: 0.95,
            pca_variance: 0.95,
            missing_warning_threshold: 0.5,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = PipelineConfig::builder()
    ///     .duplicates(DuplicateStrategy::Last)
    ///     .reduce_dimensions(true)
    ///     .pca_variance(0.9)
    ///     .build()?;
    /// ```
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// A configuration that runs only the mandatory stages.
    pub fn minimal() -> Self {
        Self {
            remove_duplicates: false,
            handle_missing: false,
            handle_outliers: false,
            encode_categoricals: false,
            scale_features: false,
            select_features: false,
            reduce_dimensions: false,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Io(e).with_context(format!("reading config {}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Whether `stage` runs under this configuration.
    pub fn is_enabled(&self, stage: PipelineStage) -> bool {
        match stage {
            PipelineStage::Cleaning | PipelineStage::TypeCoercion => true,
            PipelineStage::Duplicates => self.remove_duplicates,
            PipelineStage::MissingValues => self.handle_missing,
            PipelineStage::Outliers => self.handle_outliers,
            PipelineStage::Encoding => self.encode_categoricals,
            PipelineStage::Scaling => self.scale_features,
            PipelineStage::Selection => self.select_features,
            PipelineStage::Reduction => self.reduce_dimensions,
        }
    }

    /// The stages this configuration runs, in execution order.
    pub fn enabled_stages(&self) -> Vec<PipelineStage> {
        PipelineStage::ORDER
            .iter()
            .copied()
            .filter(|stage| self.is_enabled(*stage))
            .collect()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.pca_variance > 0.0 && self.pca_variance <= 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "pca_variance".to_string(),
                value: self.pca_variance,
                range: "(0, 1]",
            });
        }

        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(ConfigValidationError::OutOfRange {
                field: "correlation_threshold".to_string(),
                value: self.correlation_threshold,
                range: "(0, 1]",
            });
        }

        if !(0.0..=1.0).contains(&self.missing_warning_threshold) {
            return Err(ConfigValidationError::OutOfRange {
                field: "missing_warning_threshold".to_string(),
                value: self.missing_warning_threshold,
                range: "[0, 1]",
            });
        }

        if self.onehot_max_cardinality == 0 {
            return Err(ConfigValidationError::InvalidCardinality(
                self.onehot_max_cardinality,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be in {range})")]
    OutOfRange {
        field: String,
        value: f64,
        range: &'static str,
    },

    #[error("Invalid one-hot cardinality threshold: {0} (must be at least 1)")]
    InvalidCardinality(usize),

    #[error("Unknown {stage} strategy '{value}'")]
    UnknownStrategy { stage: String, value: String },
}

/// Builder for [`PipelineConfig`] with fluent API.
///
/// Setting a strategy also enables its stage.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    remove_duplicates: Option<bool>,
    duplicate_strategy: Option<DuplicateStrategy>,
    handle_missing: Option<bool>,
    missing_strategy: Option<MissingValueStrategy>,
    handle_outliers: Option<bool>,
    outlier_strategy: Option<OutlierStrategy>,
    encode_categoricals: Option<bool>,
    encoding_strategy: Option<EncodingStrategy>,
    scale_features: Option<bool>,
    scaling_strategy: Option<ScalingStrategy>,
    select_features: Option<bool>,
    reduce_dimensions: Option<bool>,
    onehot_max_cardinality: Option<usize>,
    keep_label_source: Option<bool>,
    correlation_threshold: Option<f64>,
    pca_variance: Option<f64>,
    missing_warning_threshold: Option<f64>,
}

impl PipelineConfigBuilder {
    /// Enable or disable duplicate removal.
    pub fn remove_duplicates(mut self, enable: bool) -> Self {
        self.remove_duplicates = Some(enable);
        self
    }

    /// Resolve duplicates with `strategy`.
    pub fn duplicates(mut self, strategy: DuplicateStrategy) -> Self {
        self.remove_duplicates = Some(true);
        self.duplicate_strategy = Some(strategy);
        self
    }

    /// Enable or disable missing-value handling.
    pub fn handle_missing(mut self, enable: bool) -> Self {
        self.handle_missing = Some(enable);
        self
    }

    /// Impute missing values with `strategy`.
    pub fn missing_values(mut self, strategy: MissingValueStrategy) -> Self {
        self.handle_missing = Some(true);
        self.missing_strategy = Some(strategy);
        self
    }

    /// Enable or disable outlier clipping.
    pub fn handle_outliers(mut self, enable: bool) -> Self {
        self.handle_outliers = Some(enable);
        self
    }

    /// Clip outliers with `strategy`.
    pub fn outliers(mut self, strategy: OutlierStrategy) -> Self {
        self.handle_outliers = Some(true);
        self.outlier_strategy = Some(strategy);
        self
    }

    /// Enable or disable categorical encoding.
    pub fn encode_categoricals(mut self, enable: bool) -> Self {
        self.encode_categoricals = Some(enable);
        self
    }

    /// Encode categoricals with `strategy`.
    pub fn encoding(mut self, strategy: EncodingStrategy) -> Self {
        self.encode_categoricals = Some(true);
        self.encoding_strategy = Some(strategy);
        self
    }

    /// Enable or disable feature scaling.
    pub fn scale_features(mut self, enable: bool) -> Self {
        self.scale_features = Some(enable);
        self
    }

    /// Scale numeric features with `strategy`.
    pub fn scaling(mut self, strategy: ScalingStrategy) -> Self {
        self.scale_features = Some(true);
        self.scaling_strategy = Some(strategy);
        self
    }

    /// Enable or disable feature selection.
    pub fn select_features(mut self, enable: bool) -> Self {
        self.select_features = Some(enable);
        self
    }

    /// Enable or disable PCA.
    pub fn reduce_dimensions(mut self, enable: bool) -> Self {
        self.reduce_dimensions = Some(enable);
        self
    }

    /// Distinct-value count below which `auto` chooses one-hot.
    pub fn onehot_max_cardinality(mut self, threshold: usize) -> Self {
        self.onehot_max_cardinality = Some(threshold);
        self
    }

    /// Keep or drop the source column of a label encoding.
    pub fn keep_label_source(mut self, keep: bool) -> Self {
        self.keep_label_source = Some(keep);
        self
    }

    /// Set the correlation pruning threshold.
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Set the cumulative variance PCA keeps.
    pub fn pca_variance(mut self, fraction: f64) -> Self {
        self.pca_variance = Some(fraction);
        self
    }

    /// Set the missing fraction above which the imputer warns.
    pub fn missing_warning_threshold(mut self, threshold: f64) -> Self {
        self.missing_warning_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            remove_duplicates: self.remove_duplicates.unwrap_or(defaults.remove_duplicates),
            duplicate_strategy: self.duplicate_strategy.unwrap_or_default(),
            handle_missing: self.handle_missing.unwrap_or(defaults.handle_missing),
            missing_strategy: self.missing_strategy.unwrap_or_default(),
            handle_outliers: self.handle_outliers.unwrap_or(defaults.handle_outliers),
            outlier_strategy: self.outlier_strategy.unwrap_or_default(),
            encode_categoricals: self
                .encode_categoricals
                .unwrap_or(defaults.encode_categoricals),
            encoding_strategy: self.encoding_strategy.unwrap_or_default(),
            scale_features: self.scale_features.unwrap_or(defaults.scale_features),
            scaling_strategy: self.scaling_strategy.unwrap_or_default(),
            select_features: self.select_features.unwrap_or(defaults.select_features),
            reduce_dimensions: self.reduce_dimensions.unwrap_or(defaults.reduce_dimensions),
            onehot_max_cardinality: self
                .onehot_max_cardinality
                .unwrap_or(defaults.onehot_max_cardinality),
            keep_label_source: self.keep_label_source.unwrap_or(defaults.keep_label_source),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            pca_variance: self.pca_variance.unwrap_or(defaults.pca_variance),
            missing_warning_threshold: self
                .missing_warning_threshold
                .unwrap_or(defaults.missing_warning_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}
