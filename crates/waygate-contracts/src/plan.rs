//! Build plan and request types.
//!
//! A `BuildPlan` is the canonical, hash-identified product of the plan
//! builder. It is immutable once constructed: the routing loop threads new
//! `RoutingState` values past it but never writes to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::authority::DelegationAuthority;
use crate::error::ErrorCode;
use crate::route::RouteRule;
use crate::step::{RouteStep, Step, ToolInvocation};
use crate::work_order::WorkOrder;

/// Format/contract version constant folded into every plan hash.
///
/// Bump this when the canonical token layout changes; two builds of the
/// same request across versions must not collide.
pub const PLAN_CONTRACT_VERSION: &str = "waygate-plan/1";

/// A build request after normalization.
///
/// `args` keys are lowercased and sorted; `rules` are sorted by node id.
/// The caller's original maps are never touched, so normalization here is
/// the single place ordering is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    /// Trimmed command identifier.
    pub command_id: String,
    pub work_order: WorkOrder,
    /// Free-form arguments, lowercased keys, sorted.
    pub args: BTreeMap<String, String>,
    /// Route rules sorted by node id.
    pub rules: Vec<RouteRule>,
}

impl NormalizedRequest {
    /// The rule governing `node_id`, if declared.
    pub fn rule_for(&self, node_id: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.node_id == node_id)
    }
}

/// A declared plan artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDecl {
    pub artifact_id: String,
    pub description: String,
}

/// The outcome of one tool execution as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_id: String,
    pub success: bool,
    /// Registered failure code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<ErrorCode>,
    /// Named outputs produced by the tool.
    pub outputs: BTreeMap<String, String>,
}

/// The canonical, hash-identified plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// SHA-256 (hex) over the canonical token string of every semantically
    /// relevant field.
    pub plan_id: String,
    pub request: NormalizedRequest,
    /// Combined structural hash of the compiled graph.
    pub graph_hash: String,
    pub node_set_hash: String,
    pub edge_set_hash: String,
    /// Authority granted by the delegation policy, once, at build time.
    pub authority: DelegationAuthority,
    /// Ordered step list derived from the graph's topological order.
    pub steps: Vec<Step>,
    /// Ordered artifact declarations.
    pub artifacts: Vec<ArtifactDecl>,
    /// Terminal tool result, present only on plans reconstructed from a
    /// completed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_result: Option<ToolResult>,
}

impl BuildPlan {
    /// The route step positioned at `node_id`, if any.
    pub fn route_step_at(&self, node_id: &str) -> Option<&RouteStep> {
        self.steps
            .iter()
            .filter_map(Step::as_route)
            .find(|step| step.node_id == node_id)
    }

    /// True if the plan commits to any concrete tool execution.
    pub fn has_tool_steps(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step, Step::ToolBuild(_)))
    }

    /// Every tool invocation the plan references: standalone tool steps and
    /// invocations embedded in route steps, in step order.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        let mut invocations = Vec::new();
        for step in &self.steps {
            match step {
                Step::Route(route) => {
                    if let Some(tool) = &route.tool {
                        invocations.push(tool.clone());
                    }
                }
                Step::ToolBuild(tool) => invocations.push(ToolInvocation {
                    tool_id: tool.tool_id.clone(),
                    bindings: tool.bindings.clone(),
                    outputs: tool.outputs.clone(),
                }),
                Step::AiBuild(_) => {}
            }
        }
        invocations
    }
}
