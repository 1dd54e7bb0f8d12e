//! Contract tests for the store traits, run against the in-memory fakes
//! through trait objects the way the core consumes them.

use std::sync::Arc;
use std::time::Duration;

use evalgate_store::fakes::{Fault, MemoryDatasetStore, MemoryPromptRegistry, MemoryRunResultsStore};
use evalgate_store::{
    DatasetStore, ItemScore, PageRequest, PromptRegistry, RunItemScores, RunResultsStore,
    StoreError,
};
use serde_json::json;

fn items(n: usize) -> Vec<RunItemScores> {
    (0..n)
        .map(|i| RunItemScores {
            item_id: format!("item-{i}"),
            trace_id: Some(format!("trace-{i}")),
            scores: vec![ItemScore::new("accuracy", 8)],
        })
        .collect()
}

#[tokio::test]
async fn dataset_lookup_distinguishes_missing_from_unreachable() {
    let store: Arc<dyn DatasetStore> = {
        let s = MemoryDatasetStore::new();
        s.insert("qa", "ds-1", json!({}));
        Arc::new(s)
    };

    assert!(store.get_dataset_by_name("qa").await.unwrap().is_some());
    assert!(store.get_dataset_by_name("other").await.unwrap().is_none());

    let down = MemoryDatasetStore::new();
    down.set_fault(Some(Fault::Unavailable));
    let err = down.get_dataset_by_name("qa").await.unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn patch_merges_nested_metadata() {
    let store = MemoryDatasetStore::new();
    store.insert(
        "qa",
        "ds-1",
        json!({
            "schema_version": "eval_infra_v1",
            "status": {"dataset_ready": true, "judges_ready": false},
            "judge_prompts": ["judge-a", "judge-b"]
        }),
    );

    let outcome = store
        .patch_dataset_metadata(
            "qa",
            &json!({"status": {"judges_ready": true}, "judge_prompts": ["judge-a"]}),
        )
        .await
        .unwrap();

    assert!(outcome.is_updated());
    let meta = store.metadata("qa").unwrap();
    assert_eq!(meta["status"]["dataset_ready"], json!(true));
    assert_eq!(meta["status"]["judges_ready"], json!(true));
    assert_eq!(meta["judge_prompts"], json!(["judge-a"]));
    assert_eq!(outcome.metadata(), &meta);
}

#[tokio::test]
async fn run_listing_is_scoped_to_dataset_name() {
    let runs = MemoryRunResultsStore::new();
    runs.insert_run("qa", "ds-1", "baseline", items(1));
    runs.insert_run("qa", "ds-1", "candidate", items(1));
    runs.insert_run("other", "ds-2", "baseline", items(1));

    let names = runs.list_run_names("qa").await.unwrap();
    assert_eq!(names, vec!["baseline".to_string(), "candidate".to_string()]);
    assert!(runs.list_run_names("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn run_items_page_past_end_is_empty() {
    let runs = MemoryRunResultsStore::new();
    runs.insert_run("qa", "ds-1", "r", items(3));

    let page = runs
        .list_run_item_scores("ds-1", "r", PageRequest { page: 5, limit: 2 })
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(runs.page_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delayed_prompt_lookup_still_answers() {
    let registry = MemoryPromptRegistry::with_prompts(["judge-a"]);
    registry.set_fault("judge-a", Fault::Delay(Duration::from_secs(60)));
    assert!(registry.prompt_exists("judge-a").await.unwrap());
}

#[tokio::test]
async fn listing_fault_does_not_affect_items() {
    let runs = MemoryRunResultsStore::new();
    runs.insert_run("qa", "ds-1", "r", items(2));
    runs.set_listing_fault(Some(Fault::Unavailable));

    let err = runs.list_run_names("qa").await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));

    let page = runs
        .list_run_item_scores("ds-1", "r", PageRequest { page: 1, limit: 50 })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
}
