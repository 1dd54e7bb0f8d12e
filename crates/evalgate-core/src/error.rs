//! Error taxonomy for evalgate.

use std::path::PathBuf;

use evalgate_store::StoreError;

/// Errors produced by contract validation.
///
/// Validation never short-circuits: `validate_contract` collects every
/// violation. The `Display` form names the offending field path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("dataset.name is required")]
    DatasetNameRequired,

    #[error("score_scale must be '0-1' (found '{found}')")]
    ScoreScale { found: String },

    #[error("dimensions must be a non-empty list")]
    DimensionsEmpty,

    #[error("dimensions[{index}].name is required")]
    DimensionNameRequired { index: usize },

    #[error("dimensions[{index}].name '{name}' is not a slug")]
    DimensionNameNotSlug { index: usize, name: String },

    #[error("dimensions[{index}].name '{name}' is declared more than once")]
    DuplicateDimension { index: usize, name: String },

    #[error("dimensions[{index}].threshold {raw} is not numeric")]
    ThresholdNotNumeric { index: usize, raw: String },

    #[error("dimensions[{index}].threshold {raw} is outside the accepted input range [0, 10]")]
    ThresholdOutOfRange { index: usize, raw: f64 },

    #[error("dimensions[{index}].threshold {value} does not normalize into [0, 1]")]
    ThresholdNotCanonical { index: usize, value: f64 },

    #[error("baseline.run_name is required")]
    BaselineRunNameRequired,

    #[error("baseline.metrics must be a non-empty mapping")]
    BaselineMetricsRequired,
}

/// Evalgate errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("unsupported contract shape in {source_path}: expected a snapshot (source + evaluation) or eval_infra_v1 metadata")]
    UnsupportedShape { source_path: String },

    #[error("contract root in {source_path} must be an object")]
    NotAnObject { source_path: String },

    #[error("contract not found: {0}")]
    ContractNotFound(String),

    #[error("failed to parse snapshot {path}: {message}")]
    SnapshotParse { path: PathBuf, message: String },

    #[error("failed to write snapshot {path}: {message}")]
    SnapshotWrite { path: PathBuf, message: String },

    #[error("dataset '{dataset}' has no {expected} metadata")]
    MissingMetadata { dataset: String, expected: String },

    #[error("unknown dimension '{dimension}' (contract declares: {declared})")]
    UnknownDimension { dimension: String, declared: String },

    #[error("contract declares no dimensions")]
    NoDimensions,

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evalgate operations.
pub type Result<T> = std::result::Result<T, EvalError>;
