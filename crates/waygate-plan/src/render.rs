//! Plan rendering.
//!
//! Both the human-readable text form and the structured JSON form derive
//! from the plan value alone, with no additional state. A plan that
//! round-trips through JSON re-renders to the identical text.

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::BuildPlan;
use waygate_contracts::step::Step;

/// Render the plan as deterministic, line-oriented text.
pub fn render_text(plan: &BuildPlan) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line(format!("plan {}", plan.plan_id));
    line(format!("command {}", plan.request.command_id));
    line(format!("work-order {}", plan.request.work_order.id.as_str()));
    line(format!("goal {}", plan.request.work_order.goal));
    for (index, constraint) in plan.request.work_order.constraints.iter().enumerate() {
        line(format!("constraint[{}] {}", index, constraint));
    }
    for (index, criterion) in plan.request.work_order.success_criteria.iter().enumerate() {
        line(format!("success[{}] {}", index, criterion));
    }
    line(format!(
        "authority {} kind={} policy={} delegation={}",
        plan.authority.provider_id,
        plan.authority.kind.as_str(),
        plan.authority.policy_id,
        plan.authority.allow_delegation
    ));
    line(format!(
        "graph {} nodes={} edges={}",
        plan.graph_hash, plan.node_set_hash, plan.edge_set_hash
    ));
    for (key, value) in &plan.request.args {
        line(format!("arg {}={}", key, value));
    }

    for step in &plan.steps {
        line(render_step(step));
    }

    for artifact in &plan.artifacts {
        line(format!("artifact {} {}", artifact.artifact_id, artifact.description));
    }

    if let Some(result) = &plan.terminal_result {
        line(format!(
            "result tool={} success={} failure={}",
            result.tool_id,
            result.success,
            result
                .failure_code
                .map(|code| code.as_str())
                .unwrap_or("none")
        ));
    }

    out
}

/// One step, one line. The match is exhaustive; a new step kind must
/// choose its rendering here.
fn render_step(step: &Step) -> String {
    match step {
        Step::Route(route) => format!(
            "step {} route node={} intent={} owner={} tool={}",
            route.id,
            route.node_id,
            route.intent.as_str(),
            route.owner.as_str(),
            route
                .tool
                .as_ref()
                .map(|t| t.tool_id.as_str())
                .unwrap_or("none")
        ),
        Step::ToolBuild(tool) => {
            let bindings: Vec<String> = tool
                .bindings
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            format!(
                "step {} tool-build tool={} bindings[{}] outputs[{}]",
                tool.id,
                tool.tool_id,
                bindings.join(","),
                tool.outputs.join(",")
            )
        }
        Step::AiBuild(ai) => format!(
            "step {} ai-build schema-len={} prompt={}",
            ai.id,
            ai.output_schema.len(),
            ai.prompt
        ),
    }
}

/// Serialize a plan to the structured JSON form.
pub fn to_json(plan: &BuildPlan) -> WaygateResult<String> {
    serde_json::to_string_pretty(plan).map_err(|e| {
        WaygateError::new(
            ErrorCode::InvalidArguments,
            format!("plan serialization failed: {}", e),
        )
    })
}

/// Reload a plan from its structured JSON form.
pub fn from_json(json: &str) -> WaygateResult<BuildPlan> {
    serde_json::from_str(json).map_err(|e| {
        WaygateError::new(
            ErrorCode::InvalidArguments,
            format!("plan deserialization failed: {}", e),
        )
    })
}
