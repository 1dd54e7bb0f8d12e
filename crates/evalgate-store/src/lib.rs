//! Evalgate-Store: remote collaborators for evaluation contracts
//!
//! This crate provides the boundary between the evaluation core and the
//! platform that owns datasets, run results and judge prompts.
//!
//! ## Layer 0 - Remote State
//!
//! Focus: well-typed interfaces over services that may fail, time out, or
//! answer with partial data.
//!
//! ## Key Components
//!
//! - `DatasetStore`, `RunResultsStore`, `PromptRegistry`: async traits
//! - `RestClient`: HTTP implementation of all three
//! - `fakes`: in-memory implementations with fault injection
//! - `deep_merge`: metadata patch semantics

mod error;
pub mod fakes;
pub mod merge;
pub mod rest;
pub mod store_traits;

pub use error::StoreError;
pub use merge::deep_merge;
pub use rest::{RestClient, RestConfig};
pub use store_traits::{
    DatasetHandle, DatasetRecord, DatasetStore, ItemScore, PageRequest, PatchOutcome,
    PromptRegistry, RunItemPage, RunItemScores, RunResultsStore, StoreResult,
};
