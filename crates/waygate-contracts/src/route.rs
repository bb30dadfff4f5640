//! Routing rules, state, and decision types.
//!
//! A `RouteRule` declares who may decide what at one graph node. A
//! `RoutingState` is the gate's immutable position value: every transition
//! produces a new state, never an edit. The `RouteIntentToken` binds an
//! externally proposed decision to the exact context it was issued for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::step::ToolInvocation;
use crate::work_order::WorkOrderId;

/// The routing intent a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteIntent {
    /// Choose a tool to run. The only intent an external decision may touch.
    SelectTool,
    /// Runtime validation of prior output.
    Validate,
    /// Human or rule review checkpoint.
    Review,
    /// Finish the run at a terminal node.
    Terminate,
}

impl RouteIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteIntent::SelectTool => "select-tool",
            RouteIntent::Validate => "validate",
            RouteIntent::Review => "review",
            RouteIntent::Terminate => "terminate",
        }
    }
}

/// The actor type allowed to resolve a route step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionOwner {
    Human,
    Ai,
    Runtime,
    Rule,
}

impl DecisionOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOwner::Human => "human",
            DecisionOwner::Ai => "ai",
            DecisionOwner::Runtime => "runtime",
            DecisionOwner::Rule => "rule",
        }
    }
}

/// The structural kind of a graph node.
///
/// The grammar's `gate` annotation parses to `Route`; the two names are one
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Start,
    Route,
    Tool,
    Terminal,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Route => "route",
            NodeKind::Tool => "tool",
            NodeKind::Terminal => "terminal",
        }
    }
}

/// Per-node routing declaration supplied with the build request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// The graph node this rule governs.
    pub node_id: String,
    /// What kind of decision happens at the node.
    pub intent: RouteIntent,
    /// Who is allowed to make it.
    pub owner: DecisionOwner,
    /// The allowed output kind for the node's step.
    pub output_kind: String,
    /// The structural kind the node must have.
    pub node_kind: NodeKind,
    /// Node ids this rule allows as successors.
    pub next: Vec<String>,
    /// Tool invocation embedded at this node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInvocation>,
}

/// Routing lifecycle status.
///
/// `Halted` and `Completed` are absorbing: the gate refuses any further
/// advance from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteStatus {
    Pending,
    Waiting,
    Halted,
    Completed,
}

impl RouteStatus {
    /// True for the two absorbing statuses.
    pub fn is_final(&self) -> bool {
        matches!(self, RouteStatus::Halted | RouteStatus::Completed)
    }
}

/// A pair of hashes binding a decision to its originating context.
///
/// `constraint_hash` commits to the work order's ordered constraints;
/// `context_hash` commits to the current node, step, and any embedded tool
/// invocation. A decision carrying a stale or foreign token is rejected by
/// the gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteIntentToken {
    /// SHA-256 (hex) over the work order constraints.
    pub constraint_hash: String,
    /// SHA-256 (hex) over the node/step/invocation context.
    pub context_hash: String,
}

/// The gate's position value. Immutable: transitions build new states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingState {
    /// The work order this state belongs to.
    pub work_order_id: WorkOrderId,
    /// Token for the current decision context.
    pub token: RouteIntentToken,
    /// The node the run is currently at.
    pub node_id: String,
    /// The intent of the current node.
    pub intent: RouteIntent,
    /// Lifecycle status.
    pub status: RouteStatus,
}

impl RoutingState {
    /// Build a fresh `Pending` state positioned at `node_id`.
    pub fn pending(
        work_order_id: WorkOrderId,
        token: RouteIntentToken,
        node_id: impl Into<String>,
        intent: RouteIntent,
    ) -> Self {
        Self {
            work_order_id,
            token,
            node_id: node_id.into(),
            intent,
            status: RouteStatus::Pending,
        }
    }

    /// A copy of this state with a different status.
    pub fn with_status(&self, status: RouteStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

/// An externally proposed tool selection for a `SelectTool` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// The tool the decider selected.
    pub tool_id: String,
    /// Input bindings for the selected tool.
    pub bindings: BTreeMap<String, String>,
    /// The intent token of the context the decision was issued for.
    pub token: RouteIntentToken,
    /// The intent the decider believes it is resolving. Anything other
    /// than `SelectTool` is out of protocol.
    pub claimed_intent: RouteIntent,
}
