//! Store trait definitions for evalgate
//!
//! These traits define the remote collaborators the evaluation core talks to:
//! - `DatasetStore`: Datasets and their metadata blobs (fetch, create, patch)
//! - `RunResultsStore`: Named runs over a dataset and their per-item scores
//! - `PromptRegistry`: Judge prompt existence checks
//!
//! All traits are async and backend-agnostic. Every call may fail, time out or
//! return partial data; callers decide which failures are fatal. In-memory
//! fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// DatasetStore
// ---------------------------------------------------------------------------

/// A dataset as known to the remote platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Platform-assigned identifier
    pub id: String,
    /// Unique dataset name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Arbitrary metadata blob (holds the `eval_infra_v1` contract when bootstrapped)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Outcome of `create_or_fetch_dataset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub id: String,
    pub name: String,
    /// `true` if the call created the dataset, `false` if it already existed
    pub created: bool,
}

/// Outcome of a metadata patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// The merged metadata was persisted.
    Updated { metadata: serde_json::Value },
    /// The merge was computed but the platform refused or ignored the write.
    Warning {
        metadata: serde_json::Value,
        reason: String,
    },
}

impl PatchOutcome {
    /// The merged metadata, whether or not it was persisted.
    pub fn metadata(&self) -> &serde_json::Value {
        match self {
            PatchOutcome::Updated { metadata } | PatchOutcome::Warning { metadata, .. } => {
                metadata
            }
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, PatchOutcome::Updated { .. })
    }
}

/// Dataset and metadata store.
///
/// Semantics:
/// - `get_dataset_by_name` returns `Ok(None)` for a dataset that definitely
///   does not exist and `Err` when the store could not be consulted.
/// - `patch_dataset_metadata` deep-merges nested objects and shallow-replaces
///   scalars and lists (see [`crate::merge::deep_merge`]).
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Fetch a dataset by its unique name.
    async fn get_dataset_by_name(&self, name: &str) -> StoreResult<Option<DatasetRecord>>;

    /// Create the dataset if missing, otherwise return the existing one untouched.
    async fn create_or_fetch_dataset(
        &self,
        name: &str,
        description: Option<&str>,
        metadata: serde_json::Value,
    ) -> StoreResult<DatasetHandle>;

    /// Merge `patch` into the dataset's metadata. Fails with
    /// `StoreError::DatasetNotFound` if the dataset does not exist.
    async fn patch_dataset_metadata(
        &self,
        name: &str,
        patch: &serde_json::Value,
    ) -> StoreResult<PatchOutcome>;
}

// ---------------------------------------------------------------------------
// RunResultsStore
// ---------------------------------------------------------------------------

/// A single named score attached to a run item. `value` is left raw; the
/// caller owns scale interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemScore {
    pub name: String,
    pub value: serde_json::Value,
}

impl ItemScore {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Scores reported for one dataset item within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItemScores {
    pub item_id: String,
    pub trace_id: Option<String>,
    pub scores: Vec<ItemScore>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

/// One page of run items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunItemPage {
    pub items: Vec<RunItemScores>,
    /// Total page count as reported by the remote side, if it reports one.
    /// Not trusted to be consistent with the item counts.
    pub total_pages: Option<u32>,
}

/// Run-results store.
///
/// `list_run_names` may legitimately return an empty list both for a dataset
/// with no runs and, with some backends, when the listing silently failed.
#[async_trait]
pub trait RunResultsStore: Send + Sync {
    /// Names of all runs recorded against the dataset.
    async fn list_run_names(&self, dataset_name: &str) -> StoreResult<Vec<String>>;

    /// One page of per-item scores for a named run.
    async fn list_run_item_scores(
        &self,
        dataset_id: &str,
        run_name: &str,
        page: PageRequest,
    ) -> StoreResult<RunItemPage>;
}

// ---------------------------------------------------------------------------
// PromptRegistry
// ---------------------------------------------------------------------------

/// Judge prompt registry.
#[async_trait]
pub trait PromptRegistry: Send + Sync {
    /// Whether a prompt with this name exists (under the registry's serving label).
    async fn prompt_exists(&self, name: &str) -> StoreResult<bool>;
}
