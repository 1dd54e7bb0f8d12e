//! In-memory fakes for store traits (testing only)
//!
//! Provides `MemoryDatasetStore`, `MemoryRunResultsStore`, and
//! `MemoryPromptRegistry` that satisfy the trait contracts without any
//! network access. Each fake supports fault injection so callers can exercise
//! their unreachable-service and timeout policies.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::merge::deep_merge;
use crate::store_traits::*;

/// Injected behaviour for a fake call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail immediately with `StoreError::Unavailable`.
    Unavailable,
    /// Sleep before answering (drives caller timeouts).
    Delay(Duration),
}

async fn apply_fault(fault: Option<Fault>, what: &str) -> StoreResult<()> {
    match fault {
        None => Ok(()),
        Some(Fault::Unavailable) => Err(StoreError::Unavailable(format!("{what}: injected fault"))),
        Some(Fault::Delay(d)) => {
            tokio::time::sleep(d).await;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryDatasetStore
// ---------------------------------------------------------------------------

/// In-memory dataset store backed by a `HashMap<name, DatasetRecord>`.
#[derive(Debug, Default)]
pub struct MemoryDatasetStore {
    datasets: Mutex<HashMap<String, DatasetRecord>>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a dataset with a fixed id and metadata blob.
    pub fn insert(&self, name: &str, id: &str, metadata: serde_json::Value) {
        let mut datasets = self.datasets.lock().unwrap();
        datasets.insert(
            name.to_string(),
            DatasetRecord {
                id: id.to_string(),
                name: name.to_string(),
                description: None,
                metadata,
            },
        );
    }

    /// Apply a fault to every subsequent call (`None` clears it).
    pub fn set_fault(&self, fault: Option<Fault>) {
        *self.fault.lock().unwrap() = fault;
    }

    fn fault(&self) -> Option<Fault> {
        *self.fault.lock().unwrap()
    }

    /// Current metadata for a dataset (test inspection).
    pub fn metadata(&self, name: &str) -> Option<serde_json::Value> {
        let datasets = self.datasets.lock().unwrap();
        datasets.get(name).map(|d| d.metadata.clone())
    }
}

#[async_trait]
impl DatasetStore for MemoryDatasetStore {
    async fn get_dataset_by_name(&self, name: &str) -> StoreResult<Option<DatasetRecord>> {
        apply_fault(self.fault(), "get_dataset_by_name").await?;
        let datasets = self.datasets.lock().unwrap();
        Ok(datasets.get(name).cloned())
    }

    async fn create_or_fetch_dataset(
        &self,
        name: &str,
        description: Option<&str>,
        metadata: serde_json::Value,
    ) -> StoreResult<DatasetHandle> {
        apply_fault(self.fault(), "create_or_fetch_dataset").await?;
        let mut datasets = self.datasets.lock().unwrap();
        if let Some(existing) = datasets.get(name) {
            return Ok(DatasetHandle {
                id: existing.id.clone(),
                name: name.to_string(),
                created: false,
            });
        }
        let record = DatasetRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            metadata,
        };
        let handle = DatasetHandle {
            id: record.id.clone(),
            name: name.to_string(),
            created: true,
        };
        datasets.insert(name.to_string(), record);
        Ok(handle)
    }

    async fn patch_dataset_metadata(
        &self,
        name: &str,
        patch: &serde_json::Value,
    ) -> StoreResult<PatchOutcome> {
        apply_fault(self.fault(), "patch_dataset_metadata").await?;
        let mut datasets = self.datasets.lock().unwrap();
        let record = datasets
            .get_mut(name)
            .ok_or_else(|| StoreError::DatasetNotFound {
                name: name.to_string(),
            })?;
        record.metadata = deep_merge(&record.metadata, patch);
        Ok(PatchOutcome::Updated {
            metadata: record.metadata.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryRunResultsStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RunsState {
    /// dataset name -> run names
    names: HashMap<String, Vec<String>>,
    /// (dataset id, run name) -> items
    items: HashMap<(String, String), Vec<RunItemScores>>,
}

/// In-memory run-results store with real pagination.
#[derive(Debug, Default)]
pub struct MemoryRunResultsStore {
    state: Mutex<RunsState>,
    listing_fault: Mutex<Option<Fault>>,
    items_fault: Mutex<Option<Fault>>,
    reported_total_pages: Mutex<Option<Option<u32>>>,
    page_requests: Mutex<Vec<PageRequest>>,
}

impl MemoryRunResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run with its items.
    pub fn insert_run(
        &self,
        dataset_name: &str,
        dataset_id: &str,
        run_name: &str,
        items: Vec<RunItemScores>,
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .names
            .entry(dataset_name.to_string())
            .or_default()
            .push(run_name.to_string());
        state
            .items
            .insert((dataset_id.to_string(), run_name.to_string()), items);
    }

    /// Fault for `list_run_names` only.
    pub fn set_listing_fault(&self, fault: Option<Fault>) {
        *self.listing_fault.lock().unwrap() = fault;
    }

    /// Fault for `list_run_item_scores` only.
    pub fn set_items_fault(&self, fault: Option<Fault>) {
        *self.items_fault.lock().unwrap() = fault;
    }

    /// Override the `total_pages` reported on every page, simulating
    /// pagination metadata that disagrees with the actual item counts.
    pub fn override_total_pages(&self, total_pages: Option<u32>) {
        *self.reported_total_pages.lock().unwrap() = Some(total_pages);
    }

    /// Every page request received so far, in order.
    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.page_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunResultsStore for MemoryRunResultsStore {
    async fn list_run_names(&self, dataset_name: &str) -> StoreResult<Vec<String>> {
        let fault = *self.listing_fault.lock().unwrap();
        apply_fault(fault, "list_run_names").await?;
        let state = self.state.lock().unwrap();
        Ok(state.names.get(dataset_name).cloned().unwrap_or_default())
    }

    async fn list_run_item_scores(
        &self,
        dataset_id: &str,
        run_name: &str,
        page: PageRequest,
    ) -> StoreResult<RunItemPage> {
        let fault = *self.items_fault.lock().unwrap();
        apply_fault(fault, "list_run_item_scores").await?;
        self.page_requests.lock().unwrap().push(page);

        let state = self.state.lock().unwrap();
        let all = state
            .items
            .get(&(dataset_id.to_string(), run_name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let limit = page.limit.max(1) as usize;
        let start = (page.page.saturating_sub(1) as usize).saturating_mul(limit);
        let items: Vec<RunItemScores> = all.iter().skip(start).take(limit).cloned().collect();
        let computed_total = all.len().div_ceil(limit) as u32;

        let total_pages = match *self.reported_total_pages.lock().unwrap() {
            Some(reported) => reported,
            None => Some(computed_total),
        };

        Ok(RunItemPage { items, total_pages })
    }
}

// ---------------------------------------------------------------------------
// MemoryPromptRegistry
// ---------------------------------------------------------------------------

/// In-memory prompt registry with per-prompt fault injection.
#[derive(Debug, Default)]
pub struct MemoryPromptRegistry {
    prompts: Mutex<BTreeSet<String>>,
    faults: Mutex<HashMap<String, Fault>>,
}

impl MemoryPromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        {
            let mut prompts = registry.prompts.lock().unwrap();
            prompts.extend(names.into_iter().map(Into::into));
        }
        registry
    }

    pub fn insert(&self, name: &str) {
        self.prompts.lock().unwrap().insert(name.to_string());
    }

    /// Inject a fault for lookups of one prompt name.
    pub fn set_fault(&self, name: &str, fault: Fault) {
        self.faults.lock().unwrap().insert(name.to_string(), fault);
    }
}

#[async_trait]
impl PromptRegistry for MemoryPromptRegistry {
    async fn prompt_exists(&self, name: &str) -> StoreResult<bool> {
        let fault = self.faults.lock().unwrap().get(name).copied();
        apply_fault(fault, "prompt_exists").await?;
        Ok(self.prompts.lock().unwrap().contains(name))
    }
}
