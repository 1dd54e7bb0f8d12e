//! Live cross-checking against in-memory stores with injected faults.

use std::sync::Arc;
use std::time::Duration;

use evalgate_core::contract::normalize_contract;
use evalgate_core::{Discrepancy, EvalConfig, EvalContract, LiveValidator, RunListing};
use evalgate_store::fakes::{Fault, MemoryDatasetStore, MemoryPromptRegistry, MemoryRunResultsStore};
use serde_json::json;

struct Fixture {
    datasets: Arc<MemoryDatasetStore>,
    runs: Arc<MemoryRunResultsStore>,
    prompts: Arc<MemoryPromptRegistry>,
}

impl Fixture {
    fn new() -> Self {
        let datasets = Arc::new(MemoryDatasetStore::new());
        datasets.insert("support-qa", "ds-1", json!({}));

        let runs = Arc::new(MemoryRunResultsStore::new());
        runs.insert_run("support-qa", "ds-1", "baseline-1", vec![]);

        let prompts = Arc::new(MemoryPromptRegistry::with_prompts([
            "judge-accuracy",
            "judge-tone",
        ]));

        Self {
            datasets,
            runs,
            prompts,
        }
    }

    fn validator(&self) -> LiveValidator {
        LiveValidator::new(self.datasets.clone(), self.runs.clone(), self.prompts.clone())
            .with_config(EvalConfig::default().with_timeout(Duration::from_secs(1)))
    }
}

fn contract() -> EvalContract {
    normalize_contract(
        &json!({
            "source": {"dataset": {"name": "support-qa", "id": "ds-1"}},
            "evaluation": {
                "score_scale": "0-1",
                "dimensions": [
                    {"name": "accuracy", "threshold": 0.8, "judge_prompt": "judge-accuracy"},
                    {"name": "tone", "threshold": 0.6, "judge_prompt": "judge-tone"}
                ],
                "baseline": {"run_name": "baseline-1", "metrics": {"accuracy": 0.8}}
            }
        }),
        "support-bot",
        "support-bot.yaml",
    )
    .unwrap()
}

#[tokio::test]
async fn consistent_contract_has_no_discrepancies() {
    let fx = Fixture::new();
    assert!(fx.validator().validate_live(&contract()).await.is_empty());
}

#[tokio::test]
async fn unreachable_dataset_is_the_only_discrepancy() {
    let fx = Fixture::new();
    fx.datasets.set_fault(Some(Fault::Unavailable));
    let mut c = contract();
    c.judge_prompts.push("judge-missing".to_string());

    let found = fx.validator().validate_live(&c).await;
    assert_eq!(found.len(), 1);
    assert!(matches!(&found[0], Discrepancy::DatasetUnreachable { name, .. } if name == "support-qa"));
    assert!(found[0].to_string().starts_with("could not fetch dataset 'support-qa'"));
}

#[tokio::test]
async fn missing_dataset_fails_fast() {
    let fx = Fixture::new();
    let mut c = contract();
    c.dataset.name = Some("unknown-qa".to_string());

    let found = fx.validator().validate_live(&c).await;
    assert_eq!(
        found,
        vec![Discrepancy::DatasetNotFound {
            name: "unknown-qa".to_string()
        }]
    );
}

#[tokio::test]
async fn drift_and_missing_items_are_all_reported() {
    let fx = Fixture::new();
    let mut c = contract();
    c.dataset.id = Some("ds-old".to_string());
    c.baseline.run_name = "baseline-0".to_string();
    c.judge_prompts.push("judge-safety".to_string());

    let found = fx.validator().validate_live(&c).await;
    assert_eq!(
        found,
        vec![
            Discrepancy::DatasetIdMismatch {
                expected: "ds-old".to_string(),
                actual: "ds-1".to_string(),
            },
            Discrepancy::BaselineRunMissing {
                run_name: "baseline-0".to_string()
            },
            Discrepancy::PromptMissing {
                name: "judge-safety".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn unreachable_run_listing_never_reports_missing_baseline() {
    let fx = Fixture::new();
    fx.runs.set_listing_fault(Some(Fault::Unavailable));
    let mut c = contract();
    c.baseline.run_name = "baseline-0".to_string();

    assert!(fx.validator().validate_live(&c).await.is_empty());
    assert!(matches!(
        fx.validator().list_runs("support-qa").await,
        RunListing::Unavailable(_)
    ));
}

#[tokio::test]
async fn empty_run_listing_skips_baseline_check() {
    let fx = Fixture::new();
    fx.datasets.insert("fresh-qa", "ds-2", json!({}));
    let mut c = contract();
    c.dataset = evalgate_core::DatasetRef {
        name: Some("fresh-qa".to_string()),
        id: Some("ds-2".to_string()),
    };

    assert_eq!(fx.validator().list_runs("fresh-qa").await, RunListing::Empty);
    assert!(fx.validator().validate_live(&c).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_prompt_does_not_stop_other_prompt_checks() {
    let fx = Fixture::new();
    fx.prompts
        .set_fault("judge-accuracy", Fault::Delay(Duration::from_secs(30)));
    let mut c = contract();
    c.judge_prompts.push("judge-safety".to_string());

    let found = fx.validator().validate_live(&c).await;
    assert_eq!(found.len(), 2);
    match &found[0] {
        Discrepancy::PromptCheckFailed { name, reason } => {
            assert_eq!(name, "judge-accuracy");
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected PromptCheckFailed, got {other:?}"),
    }
    assert_eq!(
        found[1],
        Discrepancy::PromptMissing {
            name: "judge-safety".to_string()
        }
    );
}

#[tokio::test]
async fn unreachable_prompt_is_reported_per_name() {
    let fx = Fixture::new();
    fx.prompts.set_fault("judge-tone", Fault::Unavailable);

    let found = fx.validator().validate_live(&contract()).await;
    assert_eq!(found.len(), 1);
    assert!(found[0]
        .to_string()
        .starts_with("judge prompt check failed for judge-tone"));
}

#[tokio::test]
async fn live_sourced_contract_skips_dataset_checks() {
    let fx = Fixture::new();
    fx.datasets.set_fault(Some(Fault::Unavailable));
    let mut c = contract();
    c.source_type = Some("live".to_string());
    c.dataset.name = None;

    assert!(fx.validator().validate_live(&c).await.is_empty());
}

#[tokio::test]
async fn external_judges_skip_prompt_checks() {
    let fx = Fixture::new();
    let mut c = contract();
    c.judges_external = true;
    c.judge_prompts = vec!["judge-nowhere".to_string()];

    assert!(fx.validator().validate_live(&c).await.is_empty());
}

#[tokio::test]
async fn missing_dataset_name_is_reported() {
    let fx = Fixture::new();
    let mut c = contract();
    c.dataset.name = None;

    assert_eq!(
        fx.validator().validate_live(&c).await,
        vec![Discrepancy::DatasetNameMissing]
    );
}
