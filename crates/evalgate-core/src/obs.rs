//! Structured events for contract resolution and run evaluation.
//!
//! All events are emitted at `info!` with an `event` field naming them, so a
//! JSON subscriber (see [`crate::telemetry`]) yields one record per event.

use tracing::info;

/// Span scoping resolution and live-check events to one agent.
///
/// Async callers attach it with `tracing::Instrument`; synchronous code
/// enters it through [`ResolutionSpan`].
pub fn agent_span(agent: &str) -> tracing::Span {
    tracing::info_span!("evalgate.agent", agent = %agent)
}

/// RAII guard holding [`agent_span`] entered. Not for use across `.await`.
///
/// ```ignore
/// let _span = ResolutionSpan::enter("support-bot");
/// // tracing calls below carry agent = "support-bot"
/// ```
pub struct ResolutionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ResolutionSpan {
    pub fn enter(agent: &str) -> Self {
        Self {
            _span: agent_span(agent).entered(),
        }
    }
}

/// Emit event: a contract was resolved and normalized.
pub fn emit_contract_resolved(agent_name: &str, source_path: &str, dimensions: usize) {
    info!(
        event = "contract.resolved",
        agent_name = %agent_name,
        source = %source_path,
        dimensions = dimensions,
    );
}

/// Emit event: live cross-check finished.
pub fn emit_live_check_finished(agent_name: &str, discrepancies: usize) {
    info!(
        event = "contract.live_checked",
        agent_name = %agent_name,
        discrepancies = discrepancies,
        consistent = discrepancies == 0,
    );
}

/// Emit event: run scores aggregated.
pub fn emit_run_aggregated(dataset_name: &str, run_name: &str, items: usize, dimensions: usize) {
    info!(
        event = "run.aggregated",
        dataset = %dataset_name,
        run_name = %run_name,
        items = items,
        dimensions = dimensions,
    );
}

/// Emit event: baseline vs candidate comparison evaluated.
pub fn emit_comparison_evaluated(baseline_run: &str, candidate_run: &str, rows: usize, passed: bool) {
    info!(
        event = "comparison.evaluated",
        baseline_run = %baseline_run,
        candidate_run = %candidate_run,
        rows = rows,
        passed = passed,
    );
}

/// Emit event: failing items extracted.
pub fn emit_failures_extracted(run_name: &str, dimension: &str, threshold: f64, returned: usize) {
    info!(
        event = "failures.extracted",
        run_name = %run_name,
        dimension = %dimension,
        threshold = threshold,
        returned = returned,
    );
}
