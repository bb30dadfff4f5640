//! Tool authority and binding validation.
//!
//! Two call sites consume these checks: the gate's plan-level pre-flight
//! (every tool the plan references, before any node-level work) and the
//! per-invocation check immediately before a tool runs. Both route through
//! `DelegationAuthority::dominates`, so their verdicts cannot diverge for
//! the same (authority, requirement) pair.

use std::collections::BTreeMap;

use tracing::debug;

use waygate_contracts::authority::DelegationAuthority;
use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::BuildPlan;
use waygate_contracts::tool::ToolSpec;

use crate::catalog::ToolRegistrySnapshot;

/// Pre-flight check: the plan's granted authority must dominate every tool
/// the plan references.
///
/// Fails with `tool_missing` for a reference outside the snapshot and
/// `tool_authority_denied` for an under-authorized one.
pub fn validate_plan_authority(
    plan: &BuildPlan,
    registry: &ToolRegistrySnapshot,
) -> WaygateResult<()> {
    for invocation in plan.tool_invocations() {
        let spec = registry.get(&invocation.tool_id).ok_or_else(|| {
            WaygateError::new(
                ErrorCode::ToolMissing,
                format!("plan references tool '{}' which is not in the catalog", invocation.tool_id),
            )
        })?;

        if !plan.authority.dominates(&spec.authority) {
            return Err(WaygateError::new(
                ErrorCode::ToolAuthorityDenied,
                format!(
                    "plan authority '{}' does not dominate requirement of tool '{}'",
                    plan.authority.kind.as_str(),
                    spec.tool_id
                ),
            ));
        }
    }

    debug!(plan_id = %plan.plan_id, "plan authority pre-flight passed");
    Ok(())
}

/// Per-invocation check: authority dominance plus binding completeness.
///
/// Returns, in order of precedence: `tool_authority_denied`,
/// `tool_bindings_missing` (required inputs exist but nothing was bound),
/// `tool_binding_missing` (a specific required input is unbound), and
/// `tool_binding_unknown` (a bound key the tool does not declare).
pub fn validate_invocation(
    bindings: &BTreeMap<String, String>,
    spec: &ToolSpec,
    authority: &DelegationAuthority,
) -> WaygateResult<()> {
    if !authority.dominates(&spec.authority) {
        return Err(WaygateError::new(
            ErrorCode::ToolAuthorityDenied,
            format!(
                "authority '{}' does not dominate requirement of tool '{}'",
                authority.kind.as_str(),
                spec.tool_id
            ),
        ));
    }

    let required: Vec<&str> = spec.required_inputs().collect();
    if !required.is_empty() && bindings.is_empty() {
        return Err(WaygateError::new(
            ErrorCode::ToolBindingsMissing,
            format!("tool '{}' requires inputs but none were bound", spec.tool_id),
        ));
    }

    for name in required {
        if !bindings.contains_key(name) {
            return Err(WaygateError::new(
                ErrorCode::ToolBindingMissing,
                format!("required input '{}' of tool '{}' is not bound", name, spec.tool_id),
            ));
        }
    }

    for key in bindings.keys() {
        if !spec.declares_input(key) {
            return Err(WaygateError::new(
                ErrorCode::ToolBindingUnknown,
                format!("binding '{}' is not a declared input of tool '{}'", key, spec.tool_id),
            ));
        }
    }

    Ok(())
}
