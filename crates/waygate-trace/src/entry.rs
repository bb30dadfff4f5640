//! Trace entry and trace document types.
//!
//! A `RoutingTraceEntry` is one observable event of a routing run, stamped
//! with a monotonically increasing tick that is independent of wall-clock
//! time. A `RoutingTrace` is the serialized history of one run: enough to
//! replay its event sequence and to resume the run where it stopped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waygate_contracts::error::WaygateError;
use waygate_contracts::plan::ToolResult;
use waygate_contracts::route::RoutingState;
use waygate_contracts::step::Step;

/// Every observable event kind a routing run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceEventKind {
    PlanResolved,
    CommandDispatched,
    RouteEntered,
    DecisionRequired,
    DecisionAccepted,
    DecisionRejected,
    NodeAdvanced,
    NodeHalted,
    ToolExecuted,
    ToolResult,
    RunHalted,
    RunCompleted,
}

impl TraceEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEventKind::PlanResolved => "plan-resolved",
            TraceEventKind::CommandDispatched => "command-dispatched",
            TraceEventKind::RouteEntered => "route-entered",
            TraceEventKind::DecisionRequired => "decision-required",
            TraceEventKind::DecisionAccepted => "decision-accepted",
            TraceEventKind::DecisionRejected => "decision-rejected",
            TraceEventKind::NodeAdvanced => "node-advanced",
            TraceEventKind::NodeHalted => "node-halted",
            TraceEventKind::ToolExecuted => "tool-executed",
            TraceEventKind::ToolResult => "tool-result",
            TraceEventKind::RunHalted => "run-halted",
            TraceEventKind::RunCompleted => "run-completed",
        }
    }
}

/// One entry in the trace. Entries are appended, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTraceEntry {
    /// Monotonically increasing position, starting at 0.
    pub tick: u64,
    pub kind: TraceEventKind,
    /// Free-text detail for human readers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Snapshot of the routing state after the event, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RoutingState>,
    /// Snapshot of the step the event concerns, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// The error behind a halt or rejection, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WaygateError>,
    /// The executor-reported result on `ToolResult` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

/// The serialized history of one routing run.
///
/// `plan_id` and `catalog_hash` are recorded so resumption can fail closed
/// when either has drifted underneath a paused run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingTrace {
    /// Non-semantic identifier of the run. Never enters any hash.
    pub run_id: Uuid,
    /// Canonical id of the plan the run executes.
    pub plan_id: String,
    /// Hash of the tool catalog snapshot the run was started against.
    pub catalog_hash: String,
    /// Wall-clock export time. Observational only.
    pub recorded_at: DateTime<Utc>,
    /// All entries, in tick order.
    pub entries: Vec<RoutingTraceEntry>,
}

impl RoutingTrace {
    /// The highest tick recorded, or `None` for an empty trace.
    pub fn max_tick(&self) -> Option<u64> {
        self.entries.last().map(|entry| entry.tick)
    }

    /// The event-kind sequence, in tick order. Two runs are
    /// replay-equivalent when these sequences are identical.
    pub fn event_kinds(&self) -> Vec<TraceEventKind> {
        self.entries.iter().map(|entry| entry.kind).collect()
    }
}
