//! Evaluation infrastructure bootstrap: dataset metadata, baselines and
//! snapshot export.
//!
//! The metadata blob written here is the `eval_infra_v1` shape that
//! [`crate::contract::normalize_contract`] reads back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use evalgate_store::{
    DatasetHandle, DatasetStore, PatchOutcome, PromptRegistry, RunResultsStore,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::aggregate::RunMetricsReader;
use crate::config::EvalConfig;
use crate::contract::normalize::dimension_from_raw;
use crate::contract::{Baseline, DimensionSpec, CANONICAL_SCORE_SCALE, METADATA_SCHEMA_VERSION};
use crate::error::{EvalError, Result};

// ---------------------------------------------------------------------------
// Metadata building
// ---------------------------------------------------------------------------

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Canonicalize user-supplied dimension definitions for storage.
///
/// Names are slugified and entries without a usable name dropped; thresholds
/// are normalized (default 0.8) and, like weights, rounded to 4 decimals.
pub fn normalize_dimensions(raw: &[Value]) -> Vec<DimensionSpec> {
    raw.iter()
        .map(dimension_from_raw)
        .filter(|d| !d.name.is_empty())
        .map(|mut d| {
            d.threshold = round4(d.threshold);
            d.weight = round4(d.weight);
            d.raw_threshold = None;
            d
        })
        .collect()
}

/// Build an `eval_infra_v1` metadata blob.
///
/// Without an explicit `baseline`, the baseline of `previous` metadata is
/// carried forward. `judges_ready` defaults to true.
pub fn build_metadata(
    agent: &str,
    entry_point: &str,
    dimensions: &[DimensionSpec],
    baseline: Option<&Baseline>,
    previous: Option<&Value>,
    judges_ready: Option<bool>,
) -> Value {
    let baseline_block = match baseline {
        Some(b) => baseline_json(b),
        None => previous
            .and_then(|p| p.get("baseline"))
            .filter(|b| b.as_object().is_some_and(|m| !m.is_empty()))
            .cloned()
            .unwrap_or_else(|| json!({"run_name": "", "created_at": "", "metrics": {}})),
    };

    let baseline_ready = baseline_block
        .get("run_name")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
        && baseline_block
            .get("metrics")
            .and_then(Value::as_object)
            .is_some_and(|m| !m.is_empty());

    let dims: Vec<Value> = dimensions
        .iter()
        .map(|d| {
            json!({
                "name": d.name,
                "judge_prompt": d.judge_prompt,
                "threshold": d.threshold,
                "weight": d.weight,
                "critical": d.critical,
            })
        })
        .collect();
    let judge_prompts: Vec<&str> = dimensions.iter().map(|d| d.judge_prompt.as_str()).collect();

    json!({
        "schema_version": METADATA_SCHEMA_VERSION,
        "agent": {
            "name": agent,
            "entry_point": entry_point,
        },
        "score_scale": CANONICAL_SCORE_SCALE,
        "dimensions": dims,
        "judge_prompts": judge_prompts,
        "baseline": baseline_block,
        "status": {
            "dataset_ready": true,
            "judges_ready": judges_ready.unwrap_or(true),
            "baseline_ready": baseline_ready,
        },
    })
}

fn baseline_json(b: &Baseline) -> Value {
    json!({
        "run_name": b.run_name,
        "created_at": b.created_at.clone().unwrap_or_default(),
        "metrics": b.metrics,
    })
}

fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Input for [`EvalInfraManager::bootstrap`].
#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    pub dataset: String,
    pub agent: String,
    pub entry_point: Option<String>,
    pub description: Option<String>,
    /// Raw dimension definitions, normalized with [`normalize_dimensions`].
    pub dimensions: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapOutcome {
    pub dataset: DatasetHandle,
    pub dimensions: Vec<DimensionSpec>,
    /// Judge prompts the registry did not confirm.
    pub missing_judges: Vec<String>,
    pub metadata: PatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaselineRecord {
    pub baseline: Baseline,
    pub metadata: PatchOutcome,
}

/// Creates and maintains evaluation metadata on datasets.
#[derive(Clone)]
pub struct EvalInfraManager {
    datasets: Arc<dyn DatasetStore>,
    runs: Arc<dyn RunResultsStore>,
    prompts: Arc<dyn PromptRegistry>,
    config: EvalConfig,
    host: String,
}

impl EvalInfraManager {
    pub fn new(
        datasets: Arc<dyn DatasetStore>,
        runs: Arc<dyn RunResultsStore>,
        prompts: Arc<dyn PromptRegistry>,
    ) -> Self {
        Self {
            datasets,
            runs,
            prompts,
            config: EvalConfig::default(),
            host: String::new(),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Platform host recorded in exported snapshots.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Create the dataset if needed, then merge fresh metadata into it.
    ///
    /// An existing baseline and entry point are preserved.
    pub async fn bootstrap(&self, request: &BootstrapRequest) -> Result<BootstrapOutcome> {
        let dimensions = normalize_dimensions(&request.dimensions);
        if dimensions.is_empty() {
            return Err(EvalError::NoDimensions);
        }
        let entry_point = request.entry_point.clone().unwrap_or_default();

        let initial = build_metadata(
            &request.agent,
            &entry_point,
            &dimensions,
            None,
            None,
            Some(false),
        );
        let handle = self
            .config
            .bounded(
                "dataset create",
                self.datasets.create_or_fetch_dataset(
                    &request.dataset,
                    request.description.as_deref(),
                    initial,
                ),
            )
            .await?;
        info!(dataset = %handle.name, created = handle.created, "dataset ready");

        let missing_judges = self.missing_judges(&dimensions).await;

        let existing = self
            .config
            .bounded("dataset fetch", self.datasets.get_dataset_by_name(&request.dataset))
            .await?
            .map(|r| r.metadata)
            .unwrap_or(Value::Null);
        let entry_point = if entry_point.is_empty() {
            existing
                .pointer("/agent/entry_point")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            entry_point
        };

        let merged = build_metadata(
            &request.agent,
            &entry_point,
            &dimensions,
            None,
            Some(&existing),
            Some(missing_judges.is_empty()),
        );
        let metadata = self
            .config
            .bounded(
                "metadata patch",
                self.datasets.patch_dataset_metadata(&request.dataset, &merged),
            )
            .await?;
        if let PatchOutcome::Warning { reason, .. } = &metadata {
            warn!(dataset = %request.dataset, reason = %reason, "metadata not persisted");
        }

        Ok(BootstrapOutcome {
            dataset: handle,
            dimensions,
            missing_judges,
            metadata,
        })
    }

    async fn missing_judges(&self, dimensions: &[DimensionSpec]) -> Vec<String> {
        let checks = dimensions.iter().map(|d| async move {
            let exists = self
                .config
                .bounded("prompt check", self.prompts.prompt_exists(&d.judge_prompt))
                .await;
            match exists {
                Ok(true) => None,
                Ok(false) => Some(d.judge_prompt.clone()),
                Err(e) => {
                    warn!(prompt = %d.judge_prompt, error = %e, "judge prompt check failed");
                    Some(d.judge_prompt.clone())
                }
            }
        });
        join_all(checks).await.into_iter().flatten().collect()
    }

    /// Aggregate `run_name` and store its per-dimension means as the
    /// dataset's baseline.
    pub async fn record_baseline(&self, dataset: &str, run_name: &str) -> Result<BaselineRecord> {
        let reader = RunMetricsReader::new(self.datasets.clone(), self.runs.clone())
            .with_config(self.config.clone());
        let agg = reader.aggregate(dataset, run_name).await?;

        let baseline = Baseline {
            run_name: run_name.to_string(),
            created_at: Some(utc_now()),
            metrics: agg.means().into_iter().map(|(k, v)| (k, round4(v))).collect(),
        };
        let patch = json!({
            "baseline": baseline_json(&baseline),
            "status": {"baseline_ready": !baseline.metrics.is_empty()},
        });
        let metadata = self
            .config
            .bounded("metadata patch", self.datasets.patch_dataset_metadata(dataset, &patch))
            .await?;

        Ok(BaselineRecord { baseline, metadata })
    }

    /// Convert a dataset's `eval_infra_v1` metadata into the snapshot shape.
    pub async fn export_snapshot(&self, dataset: &str) -> Result<Value> {
        let record = self
            .config
            .bounded("dataset fetch", self.datasets.get_dataset_by_name(dataset))
            .await?
            .ok_or_else(|| EvalError::DatasetNotFound(dataset.to_string()))?;

        let metadata = &record.metadata;
        if metadata.get("schema_version").and_then(Value::as_str) != Some(METADATA_SCHEMA_VERSION) {
            return Err(EvalError::MissingMetadata {
                dataset: dataset.to_string(),
                expected: METADATA_SCHEMA_VERSION.to_string(),
            });
        }

        let field = |key: &str, default: Value| metadata.get(key).cloned().unwrap_or(default);
        let mut evaluation = Map::new();
        evaluation.insert("score_scale".to_string(), field("score_scale", json!(CANONICAL_SCORE_SCALE)));
        evaluation.insert("dimensions".to_string(), field("dimensions", json!([])));
        evaluation.insert("baseline".to_string(), field("baseline", json!({})));

        let mut snapshot = json!({
            "source": {
                "platform": {"host": self.host},
                "dataset": {"name": record.name, "id": record.id},
            },
            "evaluation": Value::Object(evaluation),
            "generated_at": utc_now(),
        });
        if let (Some(status), Some(map)) = (metadata.get("status"), snapshot.as_object_mut()) {
            map.insert("status".to_string(), status.clone());
        }
        Ok(snapshot)
    }
}

/// Write `snapshot` as `<dir>/<agent>.json` and `<dir>/<agent>.yaml`.
pub fn write_snapshot(dir: &Path, agent: &str, snapshot: &Value) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let json_path = dir.join(format!("{agent}.json"));
    std::fs::write(&json_path, serde_json::to_string_pretty(snapshot)?)?;

    let yaml_path = dir.join(format!("{agent}.yaml"));
    let yaml = serde_yaml::to_string(snapshot).map_err(|e| EvalError::SnapshotWrite {
        path: yaml_path.clone(),
        message: e.to_string(),
    })?;
    std::fs::write(&yaml_path, yaml)?;

    Ok(vec![json_path, yaml_path])
}
