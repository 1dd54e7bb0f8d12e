//! Normalization of raw contract payloads into [`EvalContract`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::model::{
    Baseline, ContractStatus, DatasetRef, DimensionSpec, EvalContract, CONTRACT_SCHEMA_VERSION,
};
use super::shape::ContractShape;
use crate::error::{EvalError, Result};
use crate::score::{normalize_score_or, normalize_value, parse_raw, THRESHOLD_FALLBACK};

/// Normalize a raw payload (snapshot or `eval_infra_v1` metadata) into the
/// canonical contract.
///
/// `agent` is used when the payload does not name its agent; `source_path`
/// is recorded as provenance.
///
/// # Errors
///
/// - `EvalError::NotAnObject`: `raw` is not a JSON object.
/// - `EvalError::UnsupportedShape`: `raw` matches neither known shape.
pub fn normalize_contract(raw: &Value, agent: &str, source_path: &str) -> Result<EvalContract> {
    if !raw.is_object() {
        return Err(EvalError::NotAnObject {
            source_path: source_path.to_string(),
        });
    }

    let shape = ContractShape::detect(raw).ok_or_else(|| EvalError::UnsupportedShape {
        source_path: source_path.to_string(),
    })?;
    debug!(shape = shape.kind(), source = %source_path, "normalizing contract");

    let contract = match shape {
        ContractShape::Snapshot(map) => from_snapshot(map, agent, source_path),
        ContractShape::Metadata(map) => from_metadata(map, agent, source_path),
    };
    Ok(contract)
}

fn from_snapshot(map: &Map<String, Value>, agent: &str, source_path: &str) -> EvalContract {
    let empty = Map::new();
    let source = object(map.get("source")).unwrap_or(&empty);
    let evaluation = object(map.get("evaluation")).unwrap_or(&empty);
    let dataset = object(source.get("dataset")).unwrap_or(&empty);

    let raw_dimensions = list(evaluation.get("dimensions"));
    let judge_prompts = raw_dimensions
        .iter()
        .filter_map(|d| d.as_object())
        .filter_map(|d| text(d.get("judge_prompt")))
        .collect();

    let judges_external = evaluation
        .get("judges_external")
        .or_else(|| map.get("judges_external"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    assemble(Parts {
        agent_name: agent.to_string(),
        source_path,
        source_type: text(source.get("type")),
        dataset: DatasetRef {
            name: text(dataset.get("name")),
            id: text(dataset.get("id")),
        },
        score_scale: evaluation.get("score_scale"),
        raw_dimensions,
        baseline: evaluation.get("baseline"),
        judge_prompts,
        judges_external,
        status: map.get("status").or_else(|| evaluation.get("status")),
    })
}

fn from_metadata(map: &Map<String, Value>, agent: &str, source_path: &str) -> EvalContract {
    let agent_name = match map.get("agent") {
        Some(Value::Object(a)) => text(a.get("name")),
        other => text(other),
    }
    .unwrap_or_else(|| agent.to_string());

    let dataset_obj = object(map.get("dataset"));
    let dataset_name = text(map.get("dataset_name")).or_else(|| match map.get("dataset") {
        Some(Value::Object(d)) => text(d.get("name")),
        other => text(other),
    });
    let dataset_id = text(map.get("dataset_id")).or_else(|| dataset_obj.and_then(|d| text(d.get("id"))));

    let judge_prompts = list(map.get("judge_prompts"))
        .iter()
        .filter_map(|p| text(Some(p)))
        .collect();

    assemble(Parts {
        agent_name,
        source_path,
        source_type: object(map.get("source")).and_then(|s| text(s.get("type"))),
        dataset: DatasetRef {
            name: dataset_name,
            id: dataset_id,
        },
        score_scale: map.get("score_scale"),
        raw_dimensions: list(map.get("dimensions")),
        baseline: map.get("baseline"),
        judge_prompts,
        judges_external: map
            .get("judges_external")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        status: map.get("status"),
    })
}

/// Fields extracted from either shape, before canonicalization.
struct Parts<'a> {
    agent_name: String,
    source_path: &'a str,
    source_type: Option<String>,
    dataset: DatasetRef,
    score_scale: Option<&'a Value>,
    raw_dimensions: &'a [Value],
    baseline: Option<&'a Value>,
    judge_prompts: Vec<String>,
    judges_external: bool,
    status: Option<&'a Value>,
}

fn assemble(parts: Parts<'_>) -> EvalContract {
    let dimensions = parts.raw_dimensions.iter().map(dimension_from_raw).collect();
    let baseline = baseline_from_raw(parts.baseline);
    let status = status_from_raw(
        parts.status,
        derive_status(&parts.dataset, &parts.judge_prompts, parts.judges_external, &baseline),
    );

    EvalContract {
        schema_version: CONTRACT_SCHEMA_VERSION.to_string(),
        agent_name: parts.agent_name,
        source_path: parts.source_path.to_string(),
        source_type: parts.source_type,
        dataset: parts.dataset,
        score_scale: canonical_scale(parts.score_scale),
        dimensions,
        baseline,
        judge_prompts: parts.judge_prompts,
        judges_external: parts.judges_external,
        status,
    }
}

/// Normalize one raw dimension entry. Non-object entries become a nameless
/// dimension so validation reports them instead of them vanishing.
pub(crate) fn dimension_from_raw(raw: &Value) -> DimensionSpec {
    let empty = Map::new();
    let dim = raw.as_object().unwrap_or(&empty);

    let name = text(dim.get("name")).map(|n| slugify(&n)).unwrap_or_default();
    let judge_prompt = text(dim.get("judge_prompt")).unwrap_or_else(|| {
        if name.is_empty() {
            String::new()
        } else {
            format!("judge-{name}")
        }
    });

    let raw_threshold = dim.get("threshold").filter(|v| !v.is_null()).cloned();
    let threshold = normalize_score_or(
        raw_threshold.as_ref().unwrap_or(&Value::Null),
        THRESHOLD_FALLBACK,
    );

    let weight = dim
        .get("weight")
        .and_then(parse_raw)
        .filter(|w| w.is_finite())
        .unwrap_or(1.0);

    DimensionSpec {
        name,
        judge_prompt,
        threshold,
        weight,
        critical: truthy(dim.get("critical")),
        raw_threshold,
    }
}

fn baseline_from_raw(raw: Option<&Value>) -> Baseline {
    let Some(map) = object(raw) else {
        return Baseline::default();
    };

    let metrics: BTreeMap<String, f64> = object(map.get("metrics"))
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| parse_raw(v).map(|x| (k.clone(), normalize_value(x))))
                .collect()
        })
        .unwrap_or_default();

    Baseline {
        run_name: text(map.get("run_name")).unwrap_or_default(),
        created_at: text(map.get("created_at")),
        metrics,
    }
}

fn derive_status(
    dataset: &DatasetRef,
    judge_prompts: &[String],
    judges_external: bool,
    baseline: &Baseline,
) -> ContractStatus {
    ContractStatus {
        dataset_ready: dataset.name.is_some(),
        judges_ready: judges_external || !judge_prompts.is_empty(),
        baseline_ready: !baseline.run_name.is_empty() && !baseline.metrics.is_empty(),
    }
}

/// Declared status flags win; absent flags fall back to what the contract
/// content implies.
fn status_from_raw(raw: Option<&Value>, derived: ContractStatus) -> ContractStatus {
    let Some(map) = object(raw) else {
        return derived;
    };
    let flag = |key: &str, fallback: bool| map.get(key).and_then(Value::as_bool).unwrap_or(fallback);
    ContractStatus {
        dataset_ready: flag("dataset_ready", derived.dataset_ready),
        judges_ready: flag("judges_ready", derived.judges_ready),
        baseline_ready: flag("baseline_ready", derived.baseline_ready),
    }
}

/// The declared tag, kept verbatim so validation can reject anything but
/// the canonical scale. A missing tag becomes `""`.
fn canonical_scale(raw: Option<&Value>) -> String {
    text(raw).unwrap_or_default()
}

/// Lowercase, collapse every run of characters outside `[a-z0-9-]` to a
/// single `-`, and trim leading/trailing dashes.
pub fn slugify(name: &str) -> String {
    static NON_SLUG: OnceLock<Regex> = OnceLock::new();
    let re = NON_SLUG.get_or_init(|| Regex::new(r"[^a-z0-9\-]+").expect("static slug pattern"));
    re.replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

pub(crate) fn is_slug(name: &str) -> bool {
    !name.is_empty() && slugify(name) == name
}

fn object(v: Option<&Value>) -> Option<&Map<String, Value>> {
    v.and_then(Value::as_object)
}

fn list(v: Option<&Value>) -> &[Value] {
    v.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Non-blank string (numbers are rendered), else `None`.
fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}
