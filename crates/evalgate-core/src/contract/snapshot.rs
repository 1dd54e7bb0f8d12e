//! Local contract snapshot files.
//!
//! Snapshots live at `<dir>/<agent>.yaml` or `<dir>/<agent>.json`; YAML wins
//! when both exist.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{EvalError, Result};

/// Default snapshot directory, relative to the working directory.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".eval-infra";

/// Locate the snapshot for `agent`.
///
/// An explicit path must exist; otherwise `<dir>/<agent>.yaml` is preferred
/// over `<dir>/<agent>.json`.
pub fn resolve_snapshot_path(dir: &Path, agent: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(EvalError::ContractNotFound(path.display().to_string()));
    }

    let yaml_path = dir.join(format!("{agent}.yaml"));
    let json_path = dir.join(format!("{agent}.json"));

    if yaml_path.exists() {
        return Ok(yaml_path);
    }
    if json_path.exists() {
        return Ok(json_path);
    }

    Err(EvalError::ContractNotFound(format!(
        "missing {} and {}",
        yaml_path.display(),
        json_path.display()
    )))
}

/// Read and parse a snapshot. `.json` files are parsed as JSON, everything
/// else as YAML. The root must be an object.
pub fn load_snapshot(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    debug!(path = %path.display(), json = is_json, "loading snapshot");

    let parsed: Value = if is_json {
        serde_json::from_str(&text).map_err(|e| EvalError::SnapshotParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&text).map_err(|e| EvalError::SnapshotParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    };

    if !parsed.is_object() {
        return Err(EvalError::NotAnObject {
            source_path: path.display().to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_preferred_over_json() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bot.json"), "{}").unwrap();
        std::fs::write(dir.path().join("bot.yaml"), "a: 1\n").unwrap();

        let path = resolve_snapshot_path(dir.path(), "bot", None).unwrap();
        assert_eq!(path, dir.path().join("bot.yaml"));
    }

    #[test]
    fn test_json_fallback() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bot.json"), "{}").unwrap();
        let path = resolve_snapshot_path(dir.path(), "bot", None).unwrap();
        assert_eq!(path, dir.path().join("bot.json"));
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = tempdir().unwrap();
        let err = resolve_snapshot_path(dir.path(), "bot", None).unwrap_err();
        assert!(matches!(err, EvalError::ContractNotFound(_)));

        let explicit = dir.path().join("elsewhere.yaml");
        let err = resolve_snapshot_path(dir.path(), "bot", Some(&explicit)).unwrap_err();
        assert!(err.to_string().contains("elsewhere.yaml"));
    }

    #[test]
    fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("a.yaml");
        std::fs::write(&yaml, "source:\n  dataset:\n    name: qa\nevaluation: {}\n").unwrap();
        let json = dir.path().join("a.json");
        std::fs::write(&json, r#"{"source": {"dataset": {"name": "qa"}}, "evaluation": {}}"#)
            .unwrap();

        assert_eq!(load_snapshot(&yaml).unwrap(), load_snapshot(&json).unwrap());
    }

    #[test]
    fn test_non_object_root_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.yaml");
        std::fs::write(&path, "- 1\n- 2\n").unwrap();
        assert!(matches!(
            load_snapshot(&path).unwrap_err(),
            EvalError::NotAnObject { .. }
        ));
    }

    #[test]
    fn test_parse_error_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
