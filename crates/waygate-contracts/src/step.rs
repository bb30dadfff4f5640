//! Plan step variants.
//!
//! `Step` is a closed tagged union with one variant per step kind. The
//! serialized form carries a `step_kind` discriminator field so plans
//! round-trip through JSON without loss, and consumers match exhaustively
//! so a new variant is a compile-time-visible change everywhere it matters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::route::{DecisionOwner, RouteIntent};
use crate::work_order::WorkOrderId;

/// A normalized tool invocation: which tool, with which input bindings,
/// declaring which outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_id: String,
    /// Input bindings, keyed by input name. `BTreeMap` keeps rendering and
    /// hashing order deterministic.
    pub bindings: BTreeMap<String, String>,
    /// Output names the invocation declares, in declaration order.
    pub outputs: Vec<String>,
}

/// One graph node's decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub id: String,
    pub description: String,
    /// The graph node this step represents.
    pub node_id: String,
    pub intent: RouteIntent,
    pub owner: DecisionOwner,
    /// The work order the step serves. Checked against plan and state on
    /// every gate call.
    pub work_order_id: WorkOrderId,
    /// Embedded invocation, present when the node's rule binds a tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInvocation>,
}

/// A concrete tool execution the plan commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBuildStep {
    pub id: String,
    pub description: String,
    pub tool_id: String,
    pub bindings: BTreeMap<String, String>,
    pub outputs: Vec<String>,
}

/// A deterministic AI prompt the plan commits to.
///
/// The prompt text and schema are fixed at plan time; no wall-clock,
/// machine, or random state may appear in either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBuildStep {
    pub id: String,
    pub description: String,
    pub prompt: String,
    /// JSON Schema (as text) the decision output must satisfy.
    pub output_schema: String,
}

/// A plan step. Exactly one variant tag per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step_kind", rename_all = "kebab-case")]
pub enum Step {
    Route(RouteStep),
    ToolBuild(ToolBuildStep),
    AiBuild(AiBuildStep),
}

impl Step {
    /// The stable step id, regardless of variant.
    pub fn id(&self) -> &str {
        match self {
            Step::Route(s) => &s.id,
            Step::ToolBuild(s) => &s.id,
            Step::AiBuild(s) => &s.id,
        }
    }

    /// The step description, regardless of variant.
    pub fn description(&self) -> &str {
        match self {
            Step::Route(s) => &s.description,
            Step::ToolBuild(s) => &s.description,
            Step::AiBuild(s) => &s.description,
        }
    }

    /// The route step inside this step, if it is one.
    pub fn as_route(&self) -> Option<&RouteStep> {
        match self {
            Step::Route(s) => Some(s),
            _ => None,
        }
    }

    /// The tool build step inside this step, if it is one.
    pub fn as_tool_build(&self) -> Option<&ToolBuildStep> {
        match self {
            Step::ToolBuild(s) => Some(s),
            _ => None,
        }
    }
}
