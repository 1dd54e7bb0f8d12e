//! Baseline vs candidate run comparison with critical-dimension guards.
//!
//! The contract's dimension list is the authority: dimensions observed in the
//! data but not declared are ignored, and declared dimensions absent from
//! both runs produce no row.

use serde::{Deserialize, Serialize};

use crate::aggregate::{mean, RunMetricsAggregate};
use crate::contract::EvalContract;
use crate::obs::emit_comparison_evaluated;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Comparison of one declared dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub dimension: String,
    pub baseline_mean: Option<f64>,
    pub candidate_mean: Option<f64>,
    /// `candidate_mean - baseline_mean`, only when both are present.
    pub delta: Option<f64>,
    pub threshold: f64,
    pub critical: bool,
    /// True when the candidate has no scores or meets the threshold.
    pub guard_pass: bool,
}

/// Compare two aggregates over the contract's declared dimensions, in
/// declaration order.
pub fn compare_runs(
    contract: &EvalContract,
    baseline: &RunMetricsAggregate,
    candidate: &RunMetricsAggregate,
) -> Vec<ComparisonRow> {
    contract
        .dimensions
        .iter()
        .filter_map(|dim| {
            let baseline_mean = mean(baseline.values(&dim.name));
            let candidate_mean = mean(candidate.values(&dim.name));
            if baseline_mean.is_none() && candidate_mean.is_none() {
                return None;
            }

            let delta = match (baseline_mean, candidate_mean) {
                (Some(b), Some(c)) => Some(c - b),
                _ => None,
            };
            let guard_pass = candidate_mean.map_or(true, |c| c >= dim.threshold);

            Some(ComparisonRow {
                dimension: dim.name.clone(),
                baseline_mean,
                candidate_mean,
                delta,
                threshold: dim.threshold,
                critical: dim.critical,
                guard_pass,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Comparison rows plus the runs they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline_run: String,
    pub candidate_run: String,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonReport {
    pub fn build(
        contract: &EvalContract,
        baseline: &RunMetricsAggregate,
        candidate: &RunMetricsAggregate,
    ) -> Self {
        let report = Self {
            baseline_run: baseline.run_name.clone(),
            candidate_run: candidate.run_name.clone(),
            rows: compare_runs(contract, baseline, candidate),
        };
        emit_comparison_evaluated(
            &report.baseline_run,
            &report.candidate_run,
            report.rows.len(),
            report.guard_passed(),
        );
        report
    }

    /// Critical rows whose guard failed.
    pub fn critical_failures(&self) -> Vec<&ComparisonRow> {
        self.rows
            .iter()
            .filter(|r| r.critical && !r.guard_pass)
            .collect()
    }

    /// Whether every critical dimension passed its guard.
    pub fn guard_passed(&self) -> bool {
        self.critical_failures().is_empty()
    }

    pub fn row(&self, dimension: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.dimension == dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        Baseline, ContractStatus, DatasetRef, DimensionSpec, CANONICAL_SCORE_SCALE,
        CONTRACT_SCHEMA_VERSION,
    };

    fn contract(dimensions: Vec<DimensionSpec>) -> EvalContract {
        EvalContract {
            schema_version: CONTRACT_SCHEMA_VERSION.to_string(),
            agent_name: "support-bot".to_string(),
            source_path: "support-bot.yaml".to_string(),
            source_type: None,
            dataset: DatasetRef::default(),
            score_scale: CANONICAL_SCORE_SCALE.to_string(),
            dimensions,
            baseline: Baseline::default(),
            judge_prompts: vec![],
            judges_external: true,
            status: ContractStatus::default(),
        }
    }

    fn agg(run: &str, entries: Vec<(&str, Vec<f64>)>) -> RunMetricsAggregate {
        let mut a = RunMetricsAggregate::empty("qa", run);
        for (name, values) in entries {
            a.by_dimension.insert(name.to_string(), values);
        }
        a
    }

    #[test]
    fn test_end_to_end_accuracy() {
        let c = contract(vec![DimensionSpec::new("accuracy", 0.8)]);
        let rows = compare_runs(
            &c,
            &agg("base", vec![("accuracy", vec![0.9, 0.7])]),
            &agg("cand", vec![("accuracy", vec![0.95])]),
        );
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!((row.baseline_mean.unwrap() - 0.8).abs() < 1e-9);
        assert!((row.candidate_mean.unwrap() - 0.95).abs() < 1e-9);
        assert!((row.delta.unwrap() - 0.15).abs() < 1e-9);
        assert!(row.guard_pass);
    }

    #[test]
    fn test_missing_candidate_passes_guard() {
        let c = contract(vec![DimensionSpec::new("accuracy", 0.8).critical()]);
        let rows = compare_runs(
            &c,
            &agg("base", vec![("accuracy", vec![0.9])]),
            &agg("cand", vec![("accuracy", vec![])]),
        );
        assert_eq!(rows[0].candidate_mean, None);
        assert_eq!(rows[0].delta, None);
        assert!(rows[0].guard_pass);
    }

    #[test]
    fn test_row_skipped_only_when_both_absent() {
        let c = contract(vec![
            DimensionSpec::new("accuracy", 0.8),
            DimensionSpec::new("tone", 0.5),
            DimensionSpec::new("safety", 0.9),
        ]);
        let rows = compare_runs(
            &c,
            &agg("base", vec![("tone", vec![0.6])]),
            &agg("cand", vec![("safety", vec![0.4]), ("undeclared", vec![0.1])]),
        );
        let names: Vec<_> = rows.iter().map(|r| r.dimension.as_str()).collect();
        assert_eq!(names, vec!["tone", "safety"]);
        assert_eq!(rows[0].candidate_mean, None);
        assert_eq!(rows[1].baseline_mean, None);
        assert!(!rows[1].guard_pass);
    }

    #[test]
    fn test_zero_scores_are_not_absent() {
        let c = contract(vec![DimensionSpec::new("accuracy", 0.0)]);
        let rows = compare_runs(
            &c,
            &agg("base", vec![("accuracy", vec![0.0])]),
            &agg("cand", vec![("accuracy", vec![0.0])]),
        );
        assert_eq!(rows[0].candidate_mean, Some(0.0));
        assert_eq!(rows[0].delta, Some(0.0));
        assert!(rows[0].guard_pass);
    }

    #[test]
    fn test_report_flags_critical_failures_only() {
        let c = contract(vec![
            DimensionSpec::new("accuracy", 0.8).critical(),
            DimensionSpec::new("tone", 0.8),
        ]);
        let report = ComparisonReport::build(
            &c,
            &agg("base", vec![("accuracy", vec![0.9]), ("tone", vec![0.9])]),
            &agg("cand", vec![("accuracy", vec![0.6]), ("tone", vec![0.1])]),
        );
        assert!(!report.guard_passed());
        let failures = report.critical_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].dimension, "accuracy");
        assert!(!report.row("tone").unwrap().guard_pass);
    }
}
