//! Canonical plan hashing and intent tokens.
//!
//! The plan id commits to every semantically relevant field of a plan, in
//! one fixed token order defined here and nowhere else. Step tokens are
//! produced by a single function that matches the step enum exhaustively,
//! so the layout cannot drift per variant.
//!
//! Token layout, in push order:
//!   1. command id
//!   2. contract version constant
//!   3. work order: id, request, goal, each constraint, each success
//!      criterion (order preserved)
//!   4. authority: provider id, kind, policy id, delegation flag
//!   5. each arg, sorted by key
//!   6. each route rule, sorted by node id
//!   7. each step in list order, with its variant payload
//!   8. each artifact in list order
//!   9. terminal tool result fields, when present
//!
//! Absolute filesystem paths are non-portable and must never leak into a
//! reproducible identity: any token value that looks like one fails the
//! hash with `plan_path_forbidden`.

use sha2::{Digest, Sha256};

use waygate_contracts::authority::DelegationAuthority;
use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::{ArtifactDecl, NormalizedRequest, ToolResult, PLAN_CONTRACT_VERSION};
use waygate_contracts::route::{RouteIntentToken, RouteRule};
use waygate_contracts::step::{Step, ToolInvocation};
use waygate_contracts::work_order::WorkOrder;

/// Accumulates canonical tokens and hashes them in push order.
pub struct PlanHasher {
    tokens: Vec<String>,
}

impl PlanHasher {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Push one `field=value` token.
    ///
    /// Fails with `plan_path_forbidden` when `value` starts with `/`, `\`,
    /// or a drive-letter prefix.
    pub fn push(&mut self, field: &str, value: &str) -> WaygateResult<()> {
        if looks_like_absolute_path(value) {
            return Err(WaygateError::new(
                ErrorCode::PlanPathForbidden,
                format!("field '{}' holds an absolute path-like value", field),
            ));
        }
        self.tokens.push(format!("{}={}", field, value));
        Ok(())
    }

    /// SHA-256 (lowercase hex) over the pipe-joined tokens, in push order.
    pub fn finish(self) -> String {
        let joined = self.tokens.join("|");
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for PlanHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// True for values that look like absolute filesystem paths: a leading
/// `/` or `\`, or an ASCII drive-letter prefix such as `C:`.
fn looks_like_absolute_path(value: &str) -> bool {
    if value.starts_with('/') || value.starts_with('\\') {
        return true;
    }
    let bytes = value.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Compute the canonical plan id over every semantically relevant field.
pub fn plan_identity(
    request: &NormalizedRequest,
    authority: &DelegationAuthority,
    steps: &[Step],
    artifacts: &[ArtifactDecl],
    terminal_result: Option<&ToolResult>,
) -> WaygateResult<String> {
    let mut hasher = PlanHasher::new();

    hasher.push("command", &request.command_id)?;
    hasher.push("version", PLAN_CONTRACT_VERSION)?;

    push_work_order(&mut hasher, &request.work_order)?;

    hasher.push("authority.provider", &authority.provider_id)?;
    hasher.push("authority.kind", authority.kind.as_str())?;
    hasher.push("authority.policy", &authority.policy_id)?;
    hasher.push("authority.delegation", &authority.allow_delegation.to_string())?;

    // args is a BTreeMap, already sorted by key.
    for (key, value) in &request.args {
        hasher.push(&format!("arg.{}", key), value)?;
    }

    // rules are sorted by node id in the normalized request.
    for rule in &request.rules {
        push_rule(&mut hasher, rule)?;
    }

    for step in steps {
        push_step(&mut hasher, step)?;
    }

    for artifact in artifacts {
        hasher.push("artifact.id", &artifact.artifact_id)?;
        hasher.push("artifact.description", &artifact.description)?;
    }

    if let Some(result) = terminal_result {
        hasher.push("result.tool", &result.tool_id)?;
        hasher.push("result.success", &result.success.to_string())?;
        if let Some(code) = &result.failure_code {
            hasher.push("result.failure", code.as_str())?;
        }
        for (name, value) in &result.outputs {
            hasher.push(&format!("result.output.{}", name), value)?;
        }
    }

    Ok(hasher.finish())
}

fn push_work_order(hasher: &mut PlanHasher, work_order: &WorkOrder) -> WaygateResult<()> {
    hasher.push("workorder.id", work_order.id.as_str())?;
    hasher.push("workorder.request", &work_order.request)?;
    hasher.push("workorder.goal", &work_order.goal)?;
    for (index, constraint) in work_order.constraints.iter().enumerate() {
        hasher.push(&format!("workorder.constraint.{}", index), constraint)?;
    }
    for (index, criterion) in work_order.success_criteria.iter().enumerate() {
        hasher.push(&format!("workorder.success.{}", index), criterion)?;
    }
    Ok(())
}

fn push_rule(hasher: &mut PlanHasher, rule: &RouteRule) -> WaygateResult<()> {
    hasher.push("rule.node", &rule.node_id)?;
    hasher.push("rule.intent", rule.intent.as_str())?;
    hasher.push("rule.owner", rule.owner.as_str())?;
    hasher.push("rule.output", &rule.output_kind)?;
    hasher.push("rule.kind", rule.node_kind.as_str())?;
    hasher.push("rule.next", &rule.next.join(","))?;
    if let Some(tool) = &rule.tool {
        push_invocation(hasher, "rule.tool", tool)?;
    }
    Ok(())
}

fn push_invocation(
    hasher: &mut PlanHasher,
    prefix: &str,
    invocation: &ToolInvocation,
) -> WaygateResult<()> {
    hasher.push(&format!("{}.id", prefix), &invocation.tool_id)?;
    for (name, value) in &invocation.bindings {
        hasher.push(&format!("{}.binding.{}", prefix, name), value)?;
    }
    hasher.push(&format!("{}.outputs", prefix), &invocation.outputs.join(","))?;
    Ok(())
}

/// Token layout for one step. Defined once for all variants; the match is
/// exhaustive so a new step kind cannot silently skip hashing.
fn push_step(hasher: &mut PlanHasher, step: &Step) -> WaygateResult<()> {
    hasher.push("step.id", step.id())?;
    hasher.push("step.description", step.description())?;

    match step {
        Step::Route(route) => {
            hasher.push("step.kind", "route")?;
            hasher.push("step.node", &route.node_id)?;
            hasher.push("step.intent", route.intent.as_str())?;
            hasher.push("step.owner", route.owner.as_str())?;
            hasher.push("step.workorder", route.work_order_id.as_str())?;
            if let Some(tool) = &route.tool {
                push_invocation(hasher, "step.tool", tool)?;
            }
        }
        Step::ToolBuild(tool) => {
            hasher.push("step.kind", "tool-build")?;
            hasher.push("step.tool", &tool.tool_id)?;
            for (name, value) in &tool.bindings {
                hasher.push(&format!("step.binding.{}", name), value)?;
            }
            hasher.push("step.outputs", &tool.outputs.join(","))?;
        }
        Step::AiBuild(ai) => {
            hasher.push("step.kind", "ai-build")?;
            hasher.push("step.prompt", &ai.prompt)?;
            hasher.push("step.schema", &ai.output_schema)?;
        }
    }
    Ok(())
}

// ── Intent tokens ────────────────────────────────────────────────────────────

/// Compute the intent token binding a decision to its context.
///
/// The constraint half commits to the work order's ordered constraints;
/// the context half commits to the node, the step, and any embedded tool
/// invocation. A decision issued against one context cannot be replayed
/// against another.
pub fn intent_token(
    work_order: &WorkOrder,
    node_id: &str,
    step_id: &str,
    tool: Option<&ToolInvocation>,
) -> RouteIntentToken {
    let mut constraint = Sha256::new();
    constraint.update(work_order.id.as_str().as_bytes());
    for item in &work_order.constraints {
        constraint.update(b"|");
        constraint.update(item.as_bytes());
    }

    let mut context = Sha256::new();
    context.update(node_id.as_bytes());
    context.update(b"|");
    context.update(step_id.as_bytes());
    if let Some(invocation) = tool {
        context.update(b"|");
        context.update(invocation.tool_id.as_bytes());
        for (name, value) in &invocation.bindings {
            context.update(b"|");
            context.update(name.as_bytes());
            context.update(b"=");
            context.update(value.as_bytes());
        }
    }

    RouteIntentToken {
        constraint_hash: hex::encode(constraint.finalize()),
        context_hash: hex::encode(context.finalize()),
    }
}
