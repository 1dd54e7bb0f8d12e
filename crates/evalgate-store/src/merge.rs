//! Metadata merge semantics shared by every `DatasetStore` backend.

use serde_json::Value;

/// Merge `patch` into `base`.
///
/// Nested objects present on both sides are merged recursively; every other
/// value in `patch` (scalars, lists, `null`) replaces the one in `base`.
/// A non-object `base` is treated as empty.
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    let Value::Object(patch_map) = patch else {
        return patch.clone();
    };

    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    for (key, value) in patch_map {
        let next = match (merged.get(key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(_)) => deep_merge(existing, value),
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }

    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_merge() {
        let base = json!({"status": {"dataset_ready": true, "judges_ready": false}});
        let patch = json!({"status": {"judges_ready": true}});
        let merged = deep_merge(&base, &patch);
        assert_eq!(
            merged,
            json!({"status": {"dataset_ready": true, "judges_ready": true}})
        );
    }

    #[test]
    fn test_lists_and_scalars_replace() {
        let base = json!({"judge_prompts": ["a", "b"], "score_scale": "0-10"});
        let patch = json!({"judge_prompts": ["c"], "score_scale": "0-1"});
        let merged = deep_merge(&base, &patch);
        assert_eq!(merged["judge_prompts"], json!(["c"]));
        assert_eq!(merged["score_scale"], json!("0-1"));
    }

    #[test]
    fn test_object_replaces_scalar() {
        let base = json!({"baseline": ""});
        let patch = json!({"baseline": {"run_name": "r1"}});
        assert_eq!(
            deep_merge(&base, &patch),
            json!({"baseline": {"run_name": "r1"}})
        );
    }

    #[test]
    fn test_non_object_base_treated_as_empty() {
        let merged = deep_merge(&Value::Null, &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }
}
