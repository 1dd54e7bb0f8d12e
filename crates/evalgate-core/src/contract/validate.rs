//! Structural validation of canonical contracts.
//!
//! Purely synchronous; no network I/O. Every violation is collected so a
//! caller can report everything wrong in one pass.

use std::collections::HashSet;

use super::model::{EvalContract, CANONICAL_SCORE_SCALE};
use super::normalize::is_slug;
use crate::error::ValidationError;
use crate::score::{parse_raw, RAW_SCALE_MAX};

/// Validate a contract. An empty list means valid.
///
/// Checks:
/// 1. `dataset.name` is set, unless the contract is live-sourced.
/// 2. `score_scale` equals the canonical tag.
/// 3. `dimensions` is non-empty; each has a slug name unique within the
///    contract, a numeric raw threshold within `[0, 10]` (if one was given),
///    and a canonical threshold within `[0, 1]`.
/// 4. `baseline.run_name` and a non-empty `baseline.metrics`, unless the
///    contract is live-sourced.
pub fn validate_contract(contract: &EvalContract) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let is_live = contract.is_live();

    if !is_live && contract.dataset.name.is_none() {
        errors.push(ValidationError::DatasetNameRequired);
    }

    if contract.score_scale != CANONICAL_SCORE_SCALE {
        errors.push(ValidationError::ScoreScale {
            found: contract.score_scale.clone(),
        });
    }

    check_dimensions(contract, &mut errors);

    if !is_live {
        if contract.baseline.run_name.is_empty() {
            errors.push(ValidationError::BaselineRunNameRequired);
        }
        if contract.baseline.metrics.is_empty() {
            errors.push(ValidationError::BaselineMetricsRequired);
        }
    }

    errors
}

fn check_dimensions(contract: &EvalContract, errors: &mut Vec<ValidationError>) {
    if contract.dimensions.is_empty() {
        errors.push(ValidationError::DimensionsEmpty);
        return;
    }

    let mut seen = HashSet::new();
    for (index, dim) in contract.dimensions.iter().enumerate() {
        if dim.name.is_empty() {
            errors.push(ValidationError::DimensionNameRequired { index });
        } else if !is_slug(&dim.name) {
            errors.push(ValidationError::DimensionNameNotSlug {
                index,
                name: dim.name.clone(),
            });
        } else if !seen.insert(dim.name.as_str()) {
            errors.push(ValidationError::DuplicateDimension {
                index,
                name: dim.name.clone(),
            });
        }

        // Strict input range: a raw threshold that only lands in [0, 1] by
        // clamping is rejected.
        if let Some(raw) = &dim.raw_threshold {
            match parse_raw(raw) {
                None => errors.push(ValidationError::ThresholdNotNumeric {
                    index,
                    raw: raw.to_string(),
                }),
                Some(v) if !(0.0..=RAW_SCALE_MAX).contains(&v) => {
                    errors.push(ValidationError::ThresholdOutOfRange { index, raw: v })
                }
                Some(_) => {}
            }
        }

        if !(0.0..=1.0).contains(&dim.threshold) {
            errors.push(ValidationError::ThresholdNotCanonical {
                index,
                value: dim.threshold,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::*;
    use serde_json::json;

    fn valid() -> EvalContract {
        EvalContract {
            schema_version: CONTRACT_SCHEMA_VERSION.to_string(),
            agent_name: "support-bot".to_string(),
            source_path: "support-bot.yaml".to_string(),
            source_type: None,
            dataset: DatasetRef {
                name: Some("support-qa".to_string()),
                id: None,
            },
            score_scale: CANONICAL_SCORE_SCALE.to_string(),
            dimensions: vec![DimensionSpec::new("accuracy", 0.8)],
            baseline: Baseline {
                run_name: "baseline-1".to_string(),
                created_at: None,
                metrics: [("accuracy".to_string(), 0.82)].into_iter().collect(),
            },
            judge_prompts: vec![],
            judges_external: false,
            status: ContractStatus::default(),
        }
    }

    #[test]
    fn test_valid_contract_has_no_errors() {
        assert!(validate_contract(&valid()).is_empty());
    }

    #[test]
    fn test_missing_dimensions_single_error() {
        let mut c = valid();
        c.dimensions.clear();
        let errors = validate_contract(&c);
        assert_eq!(errors, vec![ValidationError::DimensionsEmpty]);
        let mentioning: Vec<_> = errors
            .iter()
            .filter(|e| e.to_string().contains("dimensions"))
            .collect();
        assert_eq!(mentioning.len(), 1);
    }

    #[test]
    fn test_threshold_fifteen_rejected() {
        let mut c = valid();
        c.dimensions[0].raw_threshold = Some(json!(15));
        c.dimensions[0].threshold = 1.0;
        let errors = validate_contract(&c);
        assert_eq!(
            errors,
            vec![ValidationError::ThresholdOutOfRange { index: 0, raw: 15.0 }]
        );
    }

    #[test]
    fn test_ten_point_threshold_accepted() {
        let mut c = valid();
        c.dimensions[0].raw_threshold = Some(json!(8));
        assert!(validate_contract(&c).is_empty());
    }

    #[test]
    fn test_non_numeric_threshold_rejected() {
        let mut c = valid();
        c.dimensions[0].raw_threshold = Some(json!("high"));
        let errors = validate_contract(&c);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::ThresholdNotNumeric { index: 0, .. }]
        ));
    }

    #[test]
    fn test_hand_built_threshold_out_of_canonical_range() {
        let mut c = valid();
        c.dimensions[0].raw_threshold = None;
        c.dimensions[0].threshold = 8.0;
        assert_eq!(
            validate_contract(&c),
            vec![ValidationError::ThresholdNotCanonical { index: 0, value: 8.0 }]
        );
    }

    #[test]
    fn test_dimension_names_checked() {
        let mut c = valid();
        c.dimensions.push(DimensionSpec::new("", 0.5));
        c.dimensions.push(DimensionSpec::new("accuracy", 0.5));
        c.dimensions.push(DimensionSpec::new("Tone Of Voice", 0.5));
        let errors = validate_contract(&c);
        assert!(errors.contains(&ValidationError::DimensionNameRequired { index: 1 }));
        assert!(errors.contains(&ValidationError::DuplicateDimension {
            index: 2,
            name: "accuracy".to_string()
        }));
        assert!(errors.contains(&ValidationError::DimensionNameNotSlug {
            index: 3,
            name: "Tone Of Voice".to_string()
        }));
    }

    #[test]
    fn test_all_errors_collected() {
        let mut c = valid();
        c.dataset.name = None;
        c.score_scale = "0-100".to_string();
        c.baseline = Baseline::default();
        let errors = validate_contract(&c);
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], ValidationError::DatasetNameRequired);
        assert_eq!(
            errors[1],
            ValidationError::ScoreScale {
                found: "0-100".to_string()
            }
        );
    }

    #[test]
    fn test_live_contract_relaxes_dataset_and_baseline() {
        let mut c = valid();
        c.source_type = Some(LIVE_SOURCE_TYPE.to_string());
        c.dataset.name = None;
        c.baseline = Baseline::default();
        assert!(validate_contract(&c).is_empty());
    }

    #[test]
    fn test_live_contract_still_checks_scale_and_dimensions() {
        let mut c = valid();
        c.source_type = Some(LIVE_SOURCE_TYPE.to_string());
        c.score_scale = String::new();
        c.dimensions.clear();
        assert_eq!(validate_contract(&c).len(), 2);
    }
}
