//! Canonical evaluation contract types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Schema tag carried by every canonical contract.
pub const CONTRACT_SCHEMA_VERSION: &str = "eval_contract_v1";

/// Schema tag identifying a metadata-shaped payload.
pub const METADATA_SCHEMA_VERSION: &str = "eval_infra_v1";

/// The only score scale a valid contract may declare.
pub const CANONICAL_SCORE_SCALE: &str = "0-1";

/// `source.type` value marking a contract resolved from live platform state.
pub const LIVE_SOURCE_TYPE: &str = "live";

/// One scored quality axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Slug, unique within a contract.
    pub name: String,
    /// Judge prompt reference; `judge-<name>` when the producer gave none.
    pub judge_prompt: String,
    /// Pass threshold on the canonical 0–1 scale.
    pub threshold: f64,
    pub weight: f64,
    pub critical: bool,
    /// Threshold exactly as the producer wrote it. `None` when it was
    /// absent and `threshold` holds the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_threshold: Option<serde_json::Value>,
}

impl DimensionSpec {
    /// A non-critical dimension with weight 1.0 and the default judge prompt.
    pub fn new(name: &str, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            judge_prompt: format!("judge-{name}"),
            threshold,
            weight: 1.0,
            critical: false,
            raw_threshold: Some(serde_json::json!(threshold)),
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_judge_prompt(mut self, judge_prompt: &str) -> Self {
        self.judge_prompt = judge_prompt.to_string();
        self
    }
}

/// Dataset identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub name: Option<String>,
    pub id: Option<String>,
}

/// The reference run later runs are compared against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Empty when no baseline has been recorded.
    pub run_name: String,
    pub created_at: Option<String>,
    /// Per-dimension means on the canonical scale.
    pub metrics: BTreeMap<String, f64>,
}

/// Readiness flags reported by the bootstrap tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStatus {
    pub dataset_ready: bool,
    pub judges_ready: bool,
    pub baseline_ready: bool,
}

/// Canonical resolved view of an agent's evaluation setup.
///
/// Built fresh by every resolution call and never mutated afterwards; two
/// resolutions of the same logical setup compare equal except for
/// `source_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalContract {
    pub schema_version: String,
    pub agent_name: String,
    /// Provenance (file path or `live:<dataset>`), used in messages only.
    pub source_path: String,
    /// `source.type` as declared by the producer.
    pub source_type: Option<String>,
    pub dataset: DatasetRef,
    pub score_scale: String,
    pub dimensions: Vec<DimensionSpec>,
    pub baseline: Baseline,
    pub judge_prompts: Vec<String>,
    pub judges_external: bool,
    pub status: ContractStatus,
}

impl EvalContract {
    /// Whether the contract was declared as live-sourced. Live contracts may
    /// legitimately lack a persisted dataset name and a baseline.
    pub fn is_live(&self) -> bool {
        self.source_type.as_deref() == Some(LIVE_SOURCE_TYPE)
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionSpec> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    /// SHA-256 hex digest of the contract's canonical JSON with provenance
    /// blanked, so logically identical contracts share a fingerprint.
    pub fn fingerprint(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("source_path");
        }
        let bytes = serde_json::to_vec(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}
