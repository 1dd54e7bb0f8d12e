//! Low-scoring item extraction for triage.

use evalgate_store::RunItemScores;
use serde::{Deserialize, Serialize};

use crate::aggregate::RunMetricsReader;
use crate::contract::EvalContract;
use crate::error::{EvalError, Result};
use crate::obs::emit_failures_extracted;
use crate::score::normalize_value;

/// Default bound on returned failures.
pub const DEFAULT_TOP: usize = 20;

/// One item scoring below threshold on a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureItem {
    pub item_id: String,
    pub trace_id: Option<String>,
    pub dimension: String,
    /// Canonical score.
    pub score: f64,
    pub threshold: f64,
}

/// What to extract. Unset fields fall back to the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureQuery {
    /// Defaults to the contract's first dimension.
    pub dimension: Option<String>,
    /// Raw override, normalized before use. Defaults to the dimension's
    /// threshold.
    pub threshold: Option<f64>,
    pub top: usize,
}

impl Default for FailureQuery {
    fn default() -> Self {
        Self {
            dimension: None,
            threshold: None,
            top: DEFAULT_TOP,
        }
    }
}

impl FailureQuery {
    pub fn for_dimension(dimension: &str) -> Self {
        Self {
            dimension: Some(dimension.to_string()),
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    /// Resolve the dimension name and canonical threshold against
    /// `contract`.
    pub fn resolve(&self, contract: &EvalContract) -> Result<(String, f64)> {
        let first = contract.dimensions.first().ok_or(EvalError::NoDimensions)?;
        let name = self.dimension.as_deref().unwrap_or(&first.name);
        let dim = contract
            .dimension(name)
            .ok_or_else(|| EvalError::UnknownDimension {
                dimension: name.to_string(),
                declared: contract.dimension_names().join(", "),
            })?;
        let threshold = self.threshold.map(normalize_value).unwrap_or(dim.threshold);
        Ok((dim.name.clone(), threshold))
    }
}

/// Items whose first numeric score on `dimension` normalizes strictly below
/// `threshold`, worst first, at most `top`.
pub fn rank_failures(
    items: &[RunItemScores],
    dimension: &str,
    threshold: f64,
    top: usize,
) -> Vec<FailureItem> {
    let mut failures: Vec<FailureItem> = items
        .iter()
        .filter_map(|item| {
            let score = item
                .scores
                .iter()
                .filter(|s| s.name == dimension)
                .find_map(|s| s.value.as_f64())
                .map(normalize_value)?;
            (score < threshold).then(|| FailureItem {
                item_id: item.item_id.clone(),
                trace_id: item.trace_id.clone(),
                dimension: dimension.to_string(),
                score,
                threshold,
            })
        })
        .collect();

    failures.sort_by(|a, b| a.score.total_cmp(&b.score));
    failures.truncate(top);
    failures
}

/// Fetch `run_name` on `dataset_name` and rank its failures.
///
/// # Errors
///
/// `EvalError::UnknownDimension` when the requested dimension is not
/// declared by the contract, `EvalError::NoDimensions` when the contract
/// declares none. A run with no failing items is `Ok(vec![])`.
pub async fn extract_failures(
    reader: &RunMetricsReader,
    contract: &EvalContract,
    dataset_name: &str,
    run_name: &str,
    query: &FailureQuery,
) -> Result<Vec<FailureItem>> {
    let (dimension, threshold) = query.resolve(contract)?;
    let items = reader.fetch_items(dataset_name, run_name).await?;
    let failures = rank_failures(&items, &dimension, threshold, query.top);
    emit_failures_extracted(run_name, &dimension, threshold, failures.len());
    Ok(failures)
}
