//! Collaborator trait definitions for the routing loop.
//!
//! These four traits define the complete boundary to the outside world:
//!
//! - `DecisionProvider` — untrusted decider (may be backed by an AI model)
//! - `ToolExecutor`     — untrusted side effects, validated before each call
//! - `PlanStore`        — trusted persistence for pause/resume
//! - `Narrator`         — trusted observer of lifecycle events
//!
//! The loop wires them together; the gate validates everything a provider
//! or executor hands back before it can influence routing state.

use serde::{Deserialize, Serialize};

use waygate_contracts::error::{ErrorCode, WaygateResult};
use waygate_contracts::plan::{BuildPlan, ToolResult};
use waygate_contracts::route::RouteDecision;
use waygate_contracts::step::{RouteStep, ToolInvocation};
use waygate_contracts::tool::ToolSpec;
use waygate_contracts::work_order::WorkOrder;
use waygate_trace::RoutingTrace;

/// Everything a decision provider may see when asked for a tool selection.
///
/// The hashes identify the exact plan and catalog context, so a provider
/// can cache or refuse decisions for contexts it no longer recognizes.
#[derive(Debug, Clone)]
pub struct DecisionContext<'a> {
    pub work_order: &'a WorkOrder,
    /// The `SelectTool` step awaiting a decision.
    pub step: &'a RouteStep,
    /// Structural hash of the plan's graph.
    pub graph_hash: &'a str,
    /// Hash of the tool catalog snapshot in force.
    pub catalog_hash: &'a str,
    /// Node ids the step's rule allows as successors.
    pub allowed_next: &'a [String],
}

/// Produces tool selections for `SelectTool` steps.
///
/// Implementations are **untrusted**. Returning `Ok(None)` means "no
/// decision yet" in both the refusal and the not-yet-available sense: the
/// loop keeps the run waiting and the caller re-invokes later. Returning
/// `Err` aborts the run.
pub trait DecisionProvider {
    fn decide(&self, ctx: &DecisionContext<'_>) -> WaygateResult<Option<RouteDecision>>;
}

/// Runs one validated tool invocation.
///
/// Implementations are **untrusted** and only ever receive invocations the
/// authority validator has already approved. A failed execution is
/// reported through `ToolResult::success = false` with a registered
/// failure code; `Err` is reserved for infrastructure faults. Retry
/// policy, if any, lives inside the implementation.
pub trait ToolExecutor {
    fn execute(&self, invocation: &ToolInvocation, spec: &ToolSpec) -> WaygateResult<ToolResult>;
}

/// A persisted execution: the immutable plan plus its trace so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEnvelope {
    pub plan: BuildPlan,
    pub trace: RoutingTrace,
}

/// Persistence boundary, keyed by plan id.
///
/// Implementations are **trusted** and must provide read-your-writes
/// consistency per plan id. The core never assumes anything stronger.
pub trait PlanStore {
    /// Persist the envelope under its plan id, replacing any prior value.
    fn save(&self, envelope: &ExecutionEnvelope) -> WaygateResult<()>;

    /// Load the envelope for `plan_id`, or `None` when nothing was saved.
    fn load(&self, plan_id: &str) -> WaygateResult<Option<ExecutionEnvelope>>;
}

/// A lifecycle event observed by a narrator.
///
/// Narration is observational only: nothing a narrator does can feed back
/// into the transition logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarratorEvent<'a> {
    RouteEntered { node_id: &'a str },
    DecisionRequired { node_id: &'a str },
    DecisionAccepted { node_id: &'a str, tool_id: &'a str },
    Halted { node_id: &'a str, code: ErrorCode },
    Completed { node_id: &'a str },
}

/// Observes routing lifecycle events.
///
/// Passed explicitly to every gate call; there is no process-wide slot.
/// Implementations shared across threads guard their own interior state.
pub trait Narrator {
    fn narrate(&self, event: NarratorEvent<'_>);
}
