//! Structural sniffing of raw contract payloads.
//!
//! Two producers emit contracts: a local snapshot exporter and the remote
//! metadata store. Neither tags the ambiguous snapshot shape with a version,
//! so variants are recognised by their required keys, tried in a fixed
//! priority order.

use serde_json::{Map, Value};

use super::model::METADATA_SCHEMA_VERSION;

/// A raw payload tagged with the shape it was recognised as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContractShape<'a> {
    /// Has both `source` and `evaluation` keys.
    Snapshot(&'a Map<String, Value>),
    /// Has `schema_version == "eval_infra_v1"`.
    Metadata(&'a Map<String, Value>),
}

impl<'a> ContractShape<'a> {
    /// Recognise `raw`, or `None` when it matches no known shape (including
    /// when it is not an object at all).
    pub fn detect(raw: &'a Value) -> Option<Self> {
        let map = raw.as_object()?;
        if is_snapshot(map) {
            Some(ContractShape::Snapshot(map))
        } else if is_metadata(map) {
            Some(ContractShape::Metadata(map))
        } else {
            None
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContractShape::Snapshot(_) => "snapshot",
            ContractShape::Metadata(_) => "metadata",
        }
    }
}

fn is_snapshot(map: &Map<String, Value>) -> bool {
    map.contains_key("source") && map.contains_key("evaluation")
}

fn is_metadata(map: &Map<String, Value>) -> bool {
    map.get("schema_version").and_then(Value::as_str) == Some(METADATA_SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_requires_both_keys() {
        let raw = json!({"source": {}, "evaluation": {}});
        assert_eq!(ContractShape::detect(&raw).map(|s| s.kind()), Some("snapshot"));

        let half = json!({"evaluation": {}});
        assert!(ContractShape::detect(&half).is_none());
    }

    #[test]
    fn test_metadata_requires_exact_schema_tag() {
        let raw = json!({"schema_version": "eval_infra_v1"});
        assert_eq!(ContractShape::detect(&raw).map(|s| s.kind()), Some("metadata"));

        let other = json!({"schema_version": "eval_infra_v2"});
        assert!(ContractShape::detect(&other).is_none());
    }

    #[test]
    fn test_snapshot_wins_when_both_match() {
        let raw = json!({
            "schema_version": "eval_infra_v1",
            "source": {},
            "evaluation": {}
        });
        assert_eq!(ContractShape::detect(&raw).map(|s| s.kind()), Some("snapshot"));
    }

    #[test]
    fn test_non_object_matches_nothing() {
        assert!(ContractShape::detect(&json!([1, 2])).is_none());
        assert!(ContractShape::detect(&json!("eval_infra_v1")).is_none());
    }
}
