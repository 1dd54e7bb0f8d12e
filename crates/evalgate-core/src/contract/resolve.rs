//! Contract resolution from a local snapshot or live dataset metadata.

use std::path::Path;

use evalgate_store::DatasetStore;
use tracing::{debug, Instrument};

use super::model::EvalContract;
use super::normalize::normalize_contract;
use super::snapshot::{load_snapshot, resolve_snapshot_path};
use crate::error::{EvalError, Result};
use crate::obs::{agent_span, emit_contract_resolved, ResolutionSpan};

/// Resolve the contract for `agent` from the snapshot directory, or from
/// `explicit` when given.
pub fn resolve_contract(dir: &Path, agent: &str, explicit: Option<&Path>) -> Result<EvalContract> {
    let _span = ResolutionSpan::enter(agent);
    let path = resolve_snapshot_path(dir, agent, explicit)?;
    let raw = load_snapshot(&path)?;
    let contract = normalize_contract(&raw, agent, &path.display().to_string())?;
    emit_contract_resolved(&contract.agent_name, &contract.source_path, contract.dimensions.len());
    Ok(contract)
}

/// Resolve a contract from the metadata blob stored on `dataset_name`.
///
/// The fetched dataset's name and id fill in identity fields the blob
/// omits. Provenance is recorded as `live:<dataset_name>`.
pub async fn resolve_live_contract(
    datasets: &dyn DatasetStore,
    dataset_name: &str,
    agent: &str,
) -> Result<EvalContract> {
    fetch_live_contract(datasets, dataset_name, agent)
        .instrument(agent_span(agent))
        .await
}

async fn fetch_live_contract(
    datasets: &dyn DatasetStore,
    dataset_name: &str,
    agent: &str,
) -> Result<EvalContract> {
    debug!(dataset = %dataset_name, "fetching dataset metadata");
    let record = datasets
        .get_dataset_by_name(dataset_name)
        .await?
        .ok_or_else(|| EvalError::DatasetNotFound(dataset_name.to_string()))?;

    let provenance = format!("live:{dataset_name}");
    let mut contract = normalize_contract(&record.metadata, agent, &provenance)?;

    if contract.dataset.name.is_none() {
        contract.dataset.name = Some(record.name.clone());
    }
    if contract.dataset.id.is_none() {
        contract.dataset.id = Some(record.id.clone());
    }

    emit_contract_resolved(&contract.agent_name, &contract.source_path, contract.dimensions.len());
    Ok(contract)
}
