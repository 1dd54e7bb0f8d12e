//! Cross-checking a resolved contract against live platform state.
//!
//! Each check separates "could not verify" from "verified and wrong". Only the
//! dataset fetch is a hard dependency; baseline and judge checks degrade on
//! their own without penalising the contract.

use std::fmt;
use std::sync::Arc;

use evalgate_store::{DatasetStore, PromptRegistry, RunResultsStore};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn, Instrument};

use crate::config::EvalConfig;
use crate::contract::EvalContract;
use crate::error::EvalError;
use crate::obs::{agent_span, emit_live_check_finished};

/// One disagreement between a contract and the live platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    DatasetNameMissing,
    DatasetUnreachable {
        name: String,
        reason: String,
    },
    DatasetNotFound {
        name: String,
    },
    DatasetIdMismatch {
        expected: String,
        actual: String,
    },
    BaselineRunMissing {
        run_name: String,
    },
    PromptMissing {
        name: String,
    },
    /// The registry could not answer for this prompt.
    PromptCheckFailed {
        name: String,
        reason: String,
    },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::DatasetNameMissing => {
                write!(f, "dataset.name is required for live validation")
            }
            Discrepancy::DatasetUnreachable { name, reason } => {
                write!(f, "could not fetch dataset '{name}': {reason}")
            }
            Discrepancy::DatasetNotFound { name } => write!(f, "dataset '{name}' not found"),
            Discrepancy::DatasetIdMismatch { expected, actual } => {
                write!(f, "dataset id mismatch: expected {expected}, got {actual}")
            }
            Discrepancy::BaselineRunMissing { run_name } => {
                write!(f, "baseline run not found in dataset runs: {run_name}")
            }
            Discrepancy::PromptMissing { name } => write!(f, "judge prompt not found: {name}"),
            Discrepancy::PromptCheckFailed { name, reason } => {
                write!(f, "judge prompt check failed for {name}: {reason}")
            }
        }
    }
}

/// Outcome of listing a dataset's runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunListing {
    Listed(Vec<String>),
    /// The store answered with no runs.
    Empty,
    /// The store could not be asked.
    Unavailable(String),
}

impl RunListing {
    fn from_result(result: crate::error::Result<Vec<String>>) -> Self {
        match result {
            Ok(names) if names.is_empty() => RunListing::Empty,
            Ok(names) => RunListing::Listed(names),
            Err(e) => RunListing::Unavailable(e.to_string()),
        }
    }
}

/// Validates contracts against the live dataset, run and prompt stores.
#[derive(Clone)]
pub struct LiveValidator {
    datasets: Arc<dyn DatasetStore>,
    runs: Arc<dyn RunResultsStore>,
    prompts: Arc<dyn PromptRegistry>,
    config: EvalConfig,
}

impl LiveValidator {
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
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Cross-check `contract`. An empty list means consistent.
    ///
    /// 1. Live-sourced contracts skip all dataset checks.
    /// 2. The dataset must be fetchable and exist; otherwise that single
    ///    discrepancy is returned.
    /// 3. A recorded dataset id must match the fetched one.
    /// 4. A baseline run must appear in a non-empty run listing. An empty or
    ///    unavailable listing skips the check.
    /// 5. Unless judges are external, every judge prompt is checked
    ///    concurrently; each failure is reported on its own.
    pub async fn validate_live(&self, contract: &EvalContract) -> Vec<Discrepancy> {
        self.run_checks(contract)
            .instrument(agent_span(&contract.agent_name))
            .await
    }

    async fn run_checks(&self, contract: &EvalContract) -> Vec<Discrepancy> {
        let mut found = Vec::new();

        if contract.is_live() {
            debug!(agent = %contract.agent_name, "live-sourced contract; skipping dataset checks");
        } else {
            match self.check_dataset(contract).await {
                Ok(mut dataset_issues) => found.append(&mut dataset_issues),
                Err(hard) => {
                    emit_live_check_finished(&contract.agent_name, 1);
                    return vec![hard];
                }
            }
        }

        if contract.judges_external {
            debug!(agent = %contract.agent_name, "judges are external; skipping prompt checks");
        } else {
            let checks = contract
                .judge_prompts
                .iter()
                .map(|name| self.check_prompt(name));
            found.extend(join_all(checks).await.into_iter().flatten());
        }

        emit_live_check_finished(&contract.agent_name, found.len());
        found
    }

    /// List runs recorded against a dataset, classifying the outcome.
    pub async fn list_runs(&self, dataset_name: &str) -> RunListing {
        let result = self
            .config
            .bounded("list runs", self.runs.list_run_names(dataset_name))
            .await;
        RunListing::from_result(result)
    }

    /// Checks 2 to 4. `Err` carries the single discrepancy that ends the
    /// whole validation.
    async fn check_dataset(
        &self,
        contract: &EvalContract,
    ) -> Result<Vec<Discrepancy>, Discrepancy> {
        let Some(name) = contract.dataset.name.as_deref() else {
            return Err(Discrepancy::DatasetNameMissing);
        };

        let record = match self
            .config
            .bounded("dataset fetch", self.datasets.get_dataset_by_name(name))
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(Discrepancy::DatasetNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => {
                return Err(Discrepancy::DatasetUnreachable {
                    name: name.to_string(),
                    reason: unreachable_reason(&e),
                })
            }
        };

        let mut found = Vec::new();
        if let Some(expected) = contract.dataset.id.as_deref() {
            if !record.id.is_empty() && record.id != expected {
                found.push(Discrepancy::DatasetIdMismatch {
                    expected: expected.to_string(),
                    actual: record.id.clone(),
                });
            }
        }

        let baseline = contract.baseline.run_name.as_str();
        if !baseline.is_empty() {
            match self.list_runs(name).await {
                RunListing::Listed(runs) => {
                    if !runs.iter().any(|r| r == baseline) {
                        found.push(Discrepancy::BaselineRunMissing {
                            run_name: baseline.to_string(),
                        });
                    }
                }
                RunListing::Empty => {
                    debug!(dataset = %name, "no runs listed; skipping baseline check");
                }
                RunListing::Unavailable(reason) => {
                    warn!(dataset = %name, error = %reason, "run listing unavailable; skipping baseline check");
                }
            }
        }

        Ok(found)
    }

    async fn check_prompt(&self, name: &str) -> Option<Discrepancy> {
        match self
            .config
            .bounded("prompt check", self.prompts.prompt_exists(name))
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(Discrepancy::PromptMissing {
                name: name.to_string(),
            }),
            Err(e) => Some(Discrepancy::PromptCheckFailed {
                name: name.to_string(),
                reason: unreachable_reason(&e),
            }),
        }
    }
}

fn unreachable_reason(err: &EvalError) -> String {
    match err {
        EvalError::Store(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrepancy_messages() {
        let d = Discrepancy::DatasetIdMismatch {
            expected: "ds-1".to_string(),
            actual: "ds-2".to_string(),
        };
        assert_eq!(d.to_string(), "dataset id mismatch: expected ds-1, got ds-2");

        let d = Discrepancy::BaselineRunMissing {
            run_name: "baseline-1".to_string(),
        };
        assert_eq!(
            d.to_string(),
            "baseline run not found in dataset runs: baseline-1"
        );
    }

    #[test]
    fn test_run_listing_classification() {
        assert_eq!(RunListing::from_result(Ok(vec![])), RunListing::Empty);
        assert_eq!(
            RunListing::from_result(Ok(vec!["a".to_string()])),
            RunListing::Listed(vec!["a".to_string()])
        );
        let unavailable = RunListing::from_result(Err(EvalError::Timeout {
            operation: "list runs".to_string(),
            millis: 10,
        }));
        assert!(matches!(unavailable, RunListing::Unavailable(_)));
    }
}
