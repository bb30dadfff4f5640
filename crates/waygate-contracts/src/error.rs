//! The closed error-code registry and the unified runtime error type.
//!
//! All fallible operations in the Waygate pipeline return `WaygateResult<T>`.
//! Error codes are a closed, registered set of snake_case strings: a code
//! that is not in the registry cannot be constructed, and `FromStr` rejects
//! unknown strings at the boundary where codes arrive as text (tool
//! executors, persisted traces). Callers branch on `ErrorCode` to decide
//! resume-vs-abort, so the set is an enum rather than free-form strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every error code the Waygate runtime can produce.
///
/// The wire form (`as_str`) is the stable contract: it appears in traces,
/// persisted envelopes, and tool-failure reports. Variants are grouped by
/// the layer that raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Graph compilation.
    GraphEmpty,
    GraphDuplicateNode,
    GraphCycleDetected,
    GraphKindUnknown,
    GraphStartInvalid,

    // Plan construction and hashing.
    PlanStartInvalid,
    PlanPathForbidden,

    // Routing invariant violations. These halt the state machine.
    RouteWorkorderMismatch,
    RouteRuleMissing,
    RouteRuleMismatch,
    RouteDecisionUnexpected,
    RouteOwnerInvalid,
    RouteStepOutOfRange,
    RouteStateFinal,

    // Tool validation and execution.
    ToolMissing,
    ToolAuthorityDenied,
    ToolBindingMissing,
    ToolBindingUnknown,
    ToolBindingsMissing,
    ToolExecutionFailed,

    // Catalog, policy, and persistence boundaries.
    CatalogInvalid,
    PolicyRejected,
    StoreIo,

    // Resumption and general argument misuse.
    InvalidArguments,
}

impl ErrorCode {
    /// The stable snake_case wire code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::GraphEmpty => "graph_empty",
            ErrorCode::GraphDuplicateNode => "graph_duplicate_node",
            ErrorCode::GraphCycleDetected => "graph_cycle_detected",
            ErrorCode::GraphKindUnknown => "graph_kind_unknown",
            ErrorCode::GraphStartInvalid => "graph_start_invalid",
            ErrorCode::PlanStartInvalid => "plan_start_invalid",
            ErrorCode::PlanPathForbidden => "plan_path_forbidden",
            ErrorCode::RouteWorkorderMismatch => "route_workorder_mismatch",
            ErrorCode::RouteRuleMissing => "route_rule_missing",
            ErrorCode::RouteRuleMismatch => "route_rule_mismatch",
            ErrorCode::RouteDecisionUnexpected => "route_decision_unexpected",
            ErrorCode::RouteOwnerInvalid => "route_owner_invalid",
            ErrorCode::RouteStepOutOfRange => "route_step_out_of_range",
            ErrorCode::RouteStateFinal => "route_state_final",
            ErrorCode::ToolMissing => "tool_missing",
            ErrorCode::ToolAuthorityDenied => "tool_authority_denied",
            ErrorCode::ToolBindingMissing => "tool_binding_missing",
            ErrorCode::ToolBindingUnknown => "tool_binding_unknown",
            ErrorCode::ToolBindingsMissing => "tool_bindings_missing",
            ErrorCode::ToolExecutionFailed => "tool_execution_failed",
            ErrorCode::CatalogInvalid => "catalog_invalid",
            ErrorCode::PolicyRejected => "policy_rejected",
            ErrorCode::StoreIo => "store_io",
            ErrorCode::InvalidArguments => "invalid_arguments",
        }
    }

    /// All registered codes, in declaration order.
    ///
    /// Used by the round-trip test and by embedders that want to enumerate
    /// the contract.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::GraphEmpty,
        ErrorCode::GraphDuplicateNode,
        ErrorCode::GraphCycleDetected,
        ErrorCode::GraphKindUnknown,
        ErrorCode::GraphStartInvalid,
        ErrorCode::PlanStartInvalid,
        ErrorCode::PlanPathForbidden,
        ErrorCode::RouteWorkorderMismatch,
        ErrorCode::RouteRuleMissing,
        ErrorCode::RouteRuleMismatch,
        ErrorCode::RouteDecisionUnexpected,
        ErrorCode::RouteOwnerInvalid,
        ErrorCode::RouteStepOutOfRange,
        ErrorCode::RouteStateFinal,
        ErrorCode::ToolMissing,
        ErrorCode::ToolAuthorityDenied,
        ErrorCode::ToolBindingMissing,
        ErrorCode::ToolBindingUnknown,
        ErrorCode::ToolBindingsMissing,
        ErrorCode::ToolExecutionFailed,
        ErrorCode::CatalogInvalid,
        ErrorCode::PolicyRejected,
        ErrorCode::StoreIo,
        ErrorCode::InvalidArguments,
    ];
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = WaygateError;

    /// Parse a wire code. Unregistered codes are a programming error on the
    /// producing side and are rejected here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| {
                WaygateError::new(
                    ErrorCode::InvalidArguments,
                    format!("'{}' is not a registered error code", s),
                )
            })
    }
}

/// The unified error type for the Waygate runtime.
///
/// Carries a registered code, free-text detail, and an optional correlation
/// id of the form `code:tick` linking the error to a trace entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}: {detail}", .code.as_str())]
pub struct WaygateError {
    /// The registered error code.
    pub code: ErrorCode,
    /// Human-readable explanation, written to traces and logs.
    pub detail: String,
    /// `code:tick` correlation id, present on errors surfaced through the
    /// routing loop's trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

impl WaygateError {
    /// Construct an error with no correlation id.
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            correlation: None,
        }
    }

    /// Attach a `code:tick` correlation id for trace cross-referencing.
    pub fn with_correlation(mut self, tick: u64) -> Self {
        self.correlation = Some(format!("{}:{}", self.code.as_str(), tick));
        self
    }
}

/// Convenience alias used throughout the Waygate crates.
pub type WaygateResult<T> = Result<T, WaygateError>;
