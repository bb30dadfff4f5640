//! Trace replay and resumption checks.
//!
//! Replay reconstructs what the loop needs to continue a paused run: the
//! last non-terminal routing state and the tool results already obtained.
//! Before any of that is trusted, `verify_resumable` compares the trace's
//! recorded plan id and catalog hash against freshly recomputed values and
//! fails closed on any mismatch. A run must never resume against drifted
//! definitions.

use tracing::debug;

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::ToolResult;
use waygate_contracts::route::RoutingState;

use crate::entry::{RoutingTrace, TraceEventKind};

/// Fail-closed resumption check.
///
/// The recomputed plan id and the current catalog hash must match the
/// trace's recorded values exactly; otherwise `invalid_arguments`.
pub fn verify_resumable(
    trace: &RoutingTrace,
    plan_id: &str,
    catalog_hash: &str,
) -> WaygateResult<()> {
    if trace.plan_id != plan_id {
        return Err(WaygateError::new(
            ErrorCode::InvalidArguments,
            format!(
                "trace records plan '{}' but the recomputed plan id is '{}'",
                trace.plan_id, plan_id
            ),
        ));
    }
    if trace.catalog_hash != catalog_hash {
        return Err(WaygateError::new(
            ErrorCode::InvalidArguments,
            format!(
                "trace records catalog hash '{}' but the current catalog hashes to '{}'",
                trace.catalog_hash, catalog_hash
            ),
        ));
    }
    Ok(())
}

/// Reconstruct the last non-terminal routing state.
///
/// Scans backward for the most recent entry carrying a state snapshot
/// whose status is not `Completed`/`Halted`. Returns `None` when no such
/// snapshot exists, which means the run never got past planning.
pub fn recover_state(trace: &RoutingTrace) -> Option<RoutingState> {
    let state = trace
        .entries
        .iter()
        .rev()
        .filter_map(|entry| entry.state.as_ref())
        .find(|state| !state.status.is_final())
        .cloned();

    if let Some(found) = &state {
        debug!(
            node = %found.node_id,
            status = ?found.status,
            "routing state recovered from trace"
        );
    }
    state
}

/// Reconstruct tool results from paired `ToolExecuted`/`ToolResult`
/// entries, in execution order.
///
/// A `ToolResult` entry only counts when it follows a `ToolExecuted`
/// entry that has not yet been paired; stray result entries are ignored.
pub fn recover_tool_results(trace: &RoutingTrace) -> Vec<ToolResult> {
    let mut results = Vec::new();
    let mut execution_pending = false;

    for entry in &trace.entries {
        match entry.kind {
            TraceEventKind::ToolExecuted => execution_pending = true,
            TraceEventKind::ToolResult if execution_pending => {
                if let Some(result) = &entry.result {
                    results.push(result.clone());
                }
                execution_pending = false;
            }
            _ => {}
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use waygate_contracts::route::{RouteIntent, RouteIntentToken, RouteStatus, RoutingState};
    use waygate_contracts::work_order::WorkOrderId;

    use crate::builder::TraceBuilder;

    fn state(node: &str, status: RouteStatus) -> RoutingState {
        RoutingState {
            work_order_id: WorkOrderId::new("wo-replay"),
            token: RouteIntentToken {
                constraint_hash: "c".repeat(64),
                context_hash: "d".repeat(64),
            },
            node_id: node.to_string(),
            intent: RouteIntent::SelectTool,
            status,
        }
    }

    fn result(tool_id: &str) -> ToolResult {
        ToolResult {
            tool_id: tool_id.to_string(),
            success: true,
            failure_code: None,
            outputs: BTreeMap::from([("report".to_string(), "ok".to_string())]),
        }
    }

    // ── verify_resumable ─────────────────────────────────────────────────────

    #[test]
    fn matching_hashes_are_resumable() {
        let trace = TraceBuilder::new("plan-a", "catalog-a").export();
        verify_resumable(&trace, "plan-a", "catalog-a").unwrap();
    }

    #[test]
    fn plan_drift_fails_closed() {
        let trace = TraceBuilder::new("plan-a", "catalog-a").export();
        let err = verify_resumable(&trace, "plan-b", "catalog-a").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArguments);
    }

    #[test]
    fn catalog_drift_fails_closed() {
        let trace = TraceBuilder::new("plan-a", "catalog-a").export();
        let err = verify_resumable(&trace, "plan-a", "catalog-b").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArguments);
    }

    // ── recover_state ────────────────────────────────────────────────────────

    #[test]
    fn recovers_the_most_recent_non_terminal_state() {
        let mut builder = TraceBuilder::new("plan-a", "catalog-a");
        builder.append_state(
            TraceEventKind::RouteEntered,
            &state("select", RouteStatus::Pending),
            None,
        );
        builder.append_state(
            TraceEventKind::DecisionRequired,
            &state("select", RouteStatus::Waiting),
            None,
        );

        let recovered = recover_state(&builder.export()).unwrap();
        assert_eq!(recovered.node_id, "select");
        assert_eq!(recovered.status, RouteStatus::Waiting);
    }

    #[test]
    fn terminal_snapshots_are_skipped() {
        let mut builder = TraceBuilder::new("plan-a", "catalog-a");
        builder.append_state(
            TraceEventKind::RouteEntered,
            &state("select", RouteStatus::Waiting),
            None,
        );
        builder.append_state(
            TraceEventKind::RunCompleted,
            &state("done", RouteStatus::Completed),
            None,
        );

        // The completed snapshot is newer, but resumption wants the last
        // state the run could continue from.
        let recovered = recover_state(&builder.export()).unwrap();
        assert_eq!(recovered.node_id, "select");
    }

    #[test]
    fn no_state_snapshots_means_none() {
        let mut builder = TraceBuilder::new("plan-a", "catalog-a");
        builder.append(TraceEventKind::PlanResolved);
        assert!(recover_state(&builder.export()).is_none());
    }

    // ── recover_tool_results ─────────────────────────────────────────────────

    #[test]
    fn pairs_executed_and_result_entries() {
        let mut builder = TraceBuilder::new("plan-a", "catalog-a");
        builder.append_detail(TraceEventKind::ToolExecuted, "fmt");
        builder.append_result(&result("fmt"));
        builder.append_detail(TraceEventKind::ToolExecuted, "fetch");
        builder.append_result(&result("fetch"));

        let results = recover_tool_results(&builder.export());
        let ids: Vec<&str> = results.iter().map(|r| r.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["fmt", "fetch"]);
    }

    #[test]
    fn stray_result_entries_are_ignored() {
        let mut builder = TraceBuilder::new("plan-a", "catalog-a");
        // A result with no preceding execution entry.
        builder.append_result(&result("ghost"));
        builder.append_detail(TraceEventKind::ToolExecuted, "fmt");
        builder.append_result(&result("fmt"));

        let results = recover_tool_results(&builder.export());
        let ids: Vec<&str> = results.iter().map(|r| r.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["fmt"]);
    }
}
