//! Per-dimension score aggregation for a named run.

use std::collections::BTreeMap;
use std::sync::Arc;

use evalgate_store::{DatasetStore, PageRequest, RunItemScores, RunResultsStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EvalConfig;
use crate::error::Result;
use crate::obs::emit_run_aggregated;
use crate::score::normalize_value;

/// Canonical-scale scores of one run, grouped by dimension.
///
/// Lists may differ in length: items only contribute to the dimensions they
/// reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetricsAggregate {
    pub dataset_name: String,
    pub run_name: String,
    pub by_dimension: BTreeMap<String, Vec<f64>>,
}

impl RunMetricsAggregate {
    pub fn empty(dataset_name: &str, run_name: &str) -> Self {
        Self {
            dataset_name: dataset_name.to_string(),
            run_name: run_name.to_string(),
            by_dimension: BTreeMap::new(),
        }
    }

    /// Group the numeric scores of `items` by name, normalizing each.
    /// Non-numeric values are ignored.
    pub fn from_items(dataset_name: &str, run_name: &str, items: &[RunItemScores]) -> Self {
        let mut agg = Self::empty(dataset_name, run_name);
        for item in items {
            for score in &item.scores {
                if score.name.is_empty() {
                    continue;
                }
                let Some(raw) = score.value.as_f64() else {
                    continue;
                };
                agg.by_dimension
                    .entry(score.name.clone())
                    .or_default()
                    .push(normalize_value(raw));
            }
        }
        agg
    }

    pub fn values(&self, dimension: &str) -> &[f64] {
        self.by_dimension
            .get(dimension)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Mean score for `dimension`; `None` when nothing was scored.
    pub fn mean(&self, dimension: &str) -> Option<f64> {
        mean(self.values(dimension))
    }

    /// Means of every dimension with at least one score.
    pub fn means(&self) -> BTreeMap<String, f64> {
        self.by_dimension
            .iter()
            .filter_map(|(name, values)| mean(values).map(|m| (name.clone(), m)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dimension.values().all(Vec::is_empty)
    }
}

/// Arithmetic mean; `None` for an empty slice so absence is never read as
/// a zero score.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Reads per-item run scores from the run-results store.
#[derive(Clone)]
pub struct RunMetricsReader {
    datasets: Arc<dyn DatasetStore>,
    runs: Arc<dyn RunResultsStore>,
    config: EvalConfig,
}

impl RunMetricsReader {
    pub fn new(datasets: Arc<dyn DatasetStore>, runs: Arc<dyn RunResultsStore>) -> Self {
        Self {
            datasets,
            runs,
            config: EvalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Fetch every item of `run_name` on `dataset_name`.
    ///
    /// An unknown dataset yields no items. Pagination stops at the first of:
    /// an empty page, a short page, the reported page count, or
    /// `max_pages`.
    pub async fn fetch_items(
        &self,
        dataset_name: &str,
        run_name: &str,
    ) -> Result<Vec<RunItemScores>> {
        let dataset = self
            .config
            .bounded("dataset fetch", self.datasets.get_dataset_by_name(dataset_name))
            .await?;
        let Some(dataset) = dataset else {
            warn!(dataset = %dataset_name, "dataset not found; treating run as empty");
            return Ok(Vec::new());
        };

        let limit = self.config.page_size.max(1);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            debug!(dataset = %dataset_name, run = %run_name, page, "fetching run items");
            let batch = self
                .config
                .bounded(
                    "list run items",
                    self.runs
                        .list_run_item_scores(&dataset.id, run_name, PageRequest { page, limit }),
                )
                .await?;

            let count = batch.items.len();
            items.extend(batch.items);

            if count == 0 || count < limit as usize {
                break;
            }
            if batch.total_pages.is_some_and(|total| page >= total) {
                break;
            }
            if page >= self.config.max_pages {
                warn!(run = %run_name, pages = page, "page cap reached; stopping pagination");
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Aggregate `run_name` into per-dimension canonical scores.
    pub async fn aggregate(&self, dataset_name: &str, run_name: &str) -> Result<RunMetricsAggregate> {
        let items = self.fetch_items(dataset_name, run_name).await?;
        let agg = RunMetricsAggregate::from_items(dataset_name, run_name, &items);
        emit_run_aggregated(dataset_name, run_name, items.len(), agg.by_dimension.len());
        Ok(agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalgate_store::ItemScore;
    use serde_json::json;

    fn item(id: &str, scores: Vec<ItemScore>) -> RunItemScores {
        RunItemScores {
            item_id: id.to_string(),
            trace_id: Some(format!("trace-{id}")),
            scores,
        }
    }

    #[test]
    fn test_from_items_normalizes_and_groups() {
        let items = vec![
            item("1", vec![ItemScore::new("accuracy", 9), ItemScore::new("tone", 0.5)]),
            item("2", vec![ItemScore::new("accuracy", 0.7)]),
            item("3", vec![ItemScore::new("accuracy", json!("n/a"))]),
        ];
        let agg = RunMetricsAggregate::from_items("qa", "run-1", &items);
        assert_eq!(agg.values("accuracy"), &[0.9, 0.7]);
        assert_eq!(agg.values("tone"), &[0.5]);
        assert!(agg.values("missing").is_empty());
    }

    #[test]
    fn test_mean_of_empty_is_absent() {
        assert_eq!(mean(&[]), None);
        let m = mean(&[0.9, 0.7]).unwrap();
        assert!((m - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_aggregate() {
        let agg = RunMetricsAggregate::from_items("qa", "run-1", &[]);
        assert!(agg.is_empty());
        assert!(agg.means().is_empty());
        assert_eq!(agg.mean("accuracy"), None);
    }
}
