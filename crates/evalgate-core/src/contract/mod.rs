//! Evaluation contracts: the canonical model, shape detection,
//! normalization, structural validation and resolution.

pub mod model;
pub mod normalize;
mod resolve;
pub mod shape;
pub mod snapshot;
pub mod validate;

pub use model::{
    Baseline, ContractStatus, DatasetRef, DimensionSpec, EvalContract, CANONICAL_SCORE_SCALE,
    CONTRACT_SCHEMA_VERSION, LIVE_SOURCE_TYPE, METADATA_SCHEMA_VERSION,
};
pub use normalize::{normalize_contract, slugify};
pub use resolve::{resolve_contract, resolve_live_contract};
pub use shape::ContractShape;
pub use snapshot::{load_snapshot, resolve_snapshot_path, DEFAULT_SNAPSHOT_DIR};
pub use validate::validate_contract;
