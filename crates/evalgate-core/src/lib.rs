//! Evalgate Core Library
//!
//! Resolves evaluation contracts from snapshots or live dataset metadata,
//! validates them, cross-checks them against the platform, and compares
//! runs dimension by dimension on a canonical 0–1 score scale.
//!
//! ## Layer 1 - Evaluation Contracts
//!
//! - `score`: magnitude-based score normalization
//! - `contract`: canonical model, shape detection, normalization, validation
//! - `live`: live cross-checking with per-check fault tolerance
//! - `aggregate`, `compare`, `failures`: run metrics, deltas, triage
//! - `infra`: dataset bootstrap, baseline recording, snapshot export

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod contract;
pub mod error;
pub mod failures;
pub mod infra;
pub mod live;
pub mod obs;
pub mod score;
pub mod telemetry;

pub use aggregate::{RunMetricsAggregate, RunMetricsReader};
pub use compare::{compare_runs, ComparisonReport, ComparisonRow};
pub use config::EvalConfig;
pub use contract::{
    normalize_contract, resolve_contract, resolve_live_contract, validate_contract, Baseline,
    ContractShape, ContractStatus, DatasetRef, DimensionSpec, EvalContract,
};
pub use error::{EvalError, Result, ValidationError};
pub use failures::{extract_failures, rank_failures, FailureItem, FailureQuery};
pub use infra::{
    build_metadata, normalize_dimensions, write_snapshot, BootstrapRequest, EvalInfraManager,
};
pub use live::{Discrepancy, LiveValidator, RunListing};
pub use score::{normalize_score, normalize_score_or};
