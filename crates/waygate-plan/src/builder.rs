//! The deterministic plan builder.
//!
//! Walks the compiled graph's canonical order, materializes the step each
//! node's rule describes, asks the delegation policy for the plan's one
//! authority grant, and seals the result under its canonical identity
//! hash. Calling the builder twice with an identical request yields a
//! byte-identical plan id, step list, and artifact list.

use tracing::{debug, info};

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::{ArtifactDecl, BuildPlan, NormalizedRequest};
use waygate_contracts::route::{DecisionOwner, RouteIntent, RouteRule, RoutingState};
use waygate_contracts::step::{AiBuildStep, RouteStep, Step, ToolBuildStep};
use waygate_graph::FlowGraph;

use crate::hash::{intent_token, plan_identity};
use crate::normalize::{normalize_request, BuildRequest};
use crate::policy::DelegationPolicy;

/// JSON Schema (as text) every AI tool-selection output must satisfy.
pub const TOOL_SELECTION_SCHEMA: &str = r#"{"type":"object","required":["toolId","bindings"],"properties":{"toolId":{"type":"string"},"bindings":{"type":"object","additionalProperties":{"type":"string"}}}}"#;

/// Build a canonical plan from a request and a compiled graph.
///
/// Fails with `route_rule_missing` when a graph node has no rule,
/// `route_rule_mismatch` when a rule's declared node kind disagrees with
/// the graph, and `plan_start_invalid` when the start node's rule is
/// `Terminate`.
pub fn build_plan(
    request: &BuildRequest,
    graph: &FlowGraph,
    policy: &dyn DelegationPolicy,
) -> WaygateResult<BuildPlan> {
    let normalized = normalize_request(request);
    let order = graph.topo_order()?;
    let start_node = graph.start_node();

    let mut steps: Vec<Step> = Vec::new();
    let mut artifacts: Vec<ArtifactDecl> = Vec::new();

    for (index, node_id) in order.iter().enumerate() {
        let rule = normalized.rule_for(node_id).ok_or_else(|| {
            WaygateError::new(
                ErrorCode::RouteRuleMissing,
                format!("no route rule declared for node '{}'", node_id),
            )
        })?;

        let graph_kind = graph
            .node_kind(node_id)
            .expect("topological order only yields declared nodes");
        if rule.node_kind != graph_kind {
            return Err(WaygateError::new(
                ErrorCode::RouteRuleMismatch,
                format!(
                    "rule for node '{}' declares kind '{}' but the graph says '{}'",
                    node_id,
                    rule.node_kind.as_str(),
                    graph_kind.as_str()
                ),
            ));
        }

        if node_id == start_node && rule.intent == RouteIntent::Terminate {
            return Err(WaygateError::new(
                ErrorCode::PlanStartInvalid,
                format!("start node '{}' must not terminate the run", node_id),
            ));
        }

        // Allowed next ids must be real graph successors, so the gate's
        // edge choice is always an edge the graph declares.
        for next_id in &rule.next {
            if !graph.successors(node_id).contains(next_id) {
                return Err(WaygateError::new(
                    ErrorCode::RouteRuleMismatch,
                    format!(
                        "rule for node '{}' allows next node '{}' which is not a graph successor",
                        node_id, next_id
                    ),
                ));
            }
        }

        materialize_node(&normalized, rule, index, node_id, &mut steps, &mut artifacts);
    }

    let authority = policy.grant(&normalized, &steps)?;
    let plan_id = plan_identity(&normalized, &authority, &steps, &artifacts, None)?;

    info!(
        plan_id = %plan_id,
        steps = steps.len(),
        artifacts = artifacts.len(),
        "plan built"
    );

    Ok(BuildPlan {
        plan_id,
        request: normalized,
        graph_hash: graph.structural_hash().to_string(),
        node_set_hash: graph.node_set_hash().to_string(),
        edge_set_hash: graph.edge_set_hash().to_string(),
        authority,
        steps,
        artifacts,
        terminal_result: None,
    })
}

/// Materialize the steps one node contributes, in a fixed per-node order:
/// the route step, then the AI decision step, then the tool commitment.
fn materialize_node(
    request: &NormalizedRequest,
    rule: &RouteRule,
    index: usize,
    node_id: &str,
    steps: &mut Vec<Step>,
    artifacts: &mut Vec<ArtifactDecl>,
) {
    let base_id = format!("step-{:03}-{}", index, node_id);

    steps.push(Step::Route(RouteStep {
        id: base_id.clone(),
        description: format!(
            "{} at node '{}' owned by {}",
            rule.intent.as_str(),
            node_id,
            rule.owner.as_str()
        ),
        node_id: node_id.to_string(),
        intent: rule.intent,
        owner: rule.owner,
        work_order_id: request.work_order.id.clone(),
        tool: rule.tool.clone(),
    }));

    if rule.intent == RouteIntent::SelectTool && rule.owner == DecisionOwner::Ai {
        steps.push(Step::AiBuild(AiBuildStep {
            id: format!("{}-decide", base_id),
            description: format!("tool selection prompt for node '{}'", node_id),
            prompt: selection_prompt(request, rule, node_id),
            output_schema: TOOL_SELECTION_SCHEMA.to_string(),
        }));
    }

    if let Some(tool) = &rule.tool {
        let tool_step_id = format!("{}-invoke", base_id);
        for output in &tool.outputs {
            artifacts.push(ArtifactDecl {
                artifact_id: format!("{}:{}", tool_step_id, output),
                description: format!("output '{}' of tool '{}'", output, tool.tool_id),
            });
        }
        steps.push(Step::ToolBuild(ToolBuildStep {
            id: tool_step_id,
            description: format!("invoke tool '{}'", tool.tool_id),
            tool_id: tool.tool_id.clone(),
            bindings: tool.bindings.clone(),
            outputs: tool.outputs.clone(),
        }));
    }

    debug!(node = node_id, step = %base_id, "node materialized");
}

/// The deterministic selection prompt for an Ai-owned `SelectTool` node.
///
/// Built only from plan-time values. No clock, host, or random state.
fn selection_prompt(request: &NormalizedRequest, rule: &RouteRule, node_id: &str) -> String {
    format!(
        "Select exactly one tool to advance the goal '{}' at routing node '{}'. \
         Allowed next nodes: [{}]. Respond with the tool id and its input bindings.",
        request.work_order.goal,
        node_id,
        rule.next.join(", ")
    )
}

/// The initial routing state for a freshly built plan: `Pending` at the
/// first route step, with the token bound to that step's context.
pub fn initial_state(plan: &BuildPlan) -> WaygateResult<RoutingState> {
    let first = plan
        .steps
        .iter()
        .filter_map(Step::as_route)
        .next()
        .ok_or_else(|| {
            WaygateError::new(ErrorCode::RouteStepOutOfRange, "plan has no route steps")
        })?;

    let token = intent_token(
        &plan.request.work_order,
        &first.node_id,
        &first.id,
        first.tool.as_ref(),
    );

    Ok(RoutingState::pending(
        first.work_order_id.clone(),
        token,
        first.node_id.clone(),
        first.intent,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use waygate_contracts::authority::{DelegationAuthority, ProviderKind};
    use waygate_contracts::route::{NodeKind, RouteStatus};
    use waygate_contracts::step::ToolInvocation;
    use waygate_contracts::work_order::{WorkOrder, WorkOrderId};
    use waygate_graph::parse_graph;

    use crate::policy::StaticDelegationPolicy;

    const GRAPH: &str = "select:::start --> build:::tool --> done:::terminal";

    fn local_policy() -> StaticDelegationPolicy {
        StaticDelegationPolicy::new(DelegationAuthority {
            provider_id: "builder-local".to_string(),
            kind: ProviderKind::Local,
            policy_id: "policy-test".to_string(),
            allow_delegation: false,
        })
    }

    fn work_order() -> WorkOrder {
        WorkOrder {
            id: WorkOrderId::new("wo-builder"),
            request: "format the workspace".to_string(),
            goal: "formatted sources".to_string(),
            constraints: vec!["no network".to_string()],
            success_criteria: vec!["exit code zero".to_string()],
        }
    }

    fn rule(node_id: &str, intent: RouteIntent, owner: DecisionOwner, kind: NodeKind) -> RouteRule {
        RouteRule {
            node_id: node_id.to_string(),
            intent,
            owner,
            output_kind: "selection".to_string(),
            node_kind: kind,
            next: vec![],
            tool: None,
        }
    }

    fn request() -> BuildRequest {
        let invocation = ToolInvocation {
            tool_id: "fmt".to_string(),
            bindings: BTreeMap::from([("target".to_string(), "workspace".to_string())]),
            outputs: vec!["report".to_string()],
        };

        BuildRequest {
            command_id: "build".to_string(),
            work_order: work_order(),
            args: HashMap::from([("Profile".to_string(), "release".to_string())]),
            rules: vec![
                RouteRule {
                    next: vec!["build".to_string()],
                    ..rule("select", RouteIntent::SelectTool, DecisionOwner::Ai, NodeKind::Start)
                },
                RouteRule {
                    next: vec!["done".to_string()],
                    tool: Some(invocation),
                    ..rule("build", RouteIntent::Validate, DecisionOwner::Runtime, NodeKind::Tool)
                },
                rule("done", RouteIntent::Terminate, DecisionOwner::Rule, NodeKind::Terminal),
            ],
        }
    }

    // ── Determinism ──────────────────────────────────────────────────────────

    #[test]
    fn identical_requests_yield_identical_plans() {
        let graph = parse_graph(GRAPH).unwrap();
        let policy = local_policy();

        let one = build_plan(&request(), &graph, &policy).unwrap();
        let two = build_plan(&request(), &graph, &policy).unwrap();

        assert_eq!(one.plan_id, two.plan_id);

        let ids = |p: &BuildPlan| -> Vec<(String, String)> {
            p.steps
                .iter()
                .map(|s| (s.id().to_string(), s.description().to_string()))
                .collect()
        };
        assert_eq!(ids(&one), ids(&two));
        assert_eq!(one.artifacts, two.artifacts);
    }

    // ── Step derivation ──────────────────────────────────────────────────────

    #[test]
    fn steps_follow_topological_order() {
        let graph = parse_graph(GRAPH).unwrap();
        let plan = build_plan(&request(), &graph, &local_policy()).unwrap();

        let route_nodes: Vec<&str> = plan
            .steps
            .iter()
            .filter_map(Step::as_route)
            .map(|s| s.node_id.as_str())
            .collect();
        assert_eq!(route_nodes, vec!["select", "build", "done"]);
    }

    #[test]
    fn ai_select_node_gets_a_prompt_step() {
        let graph = parse_graph(GRAPH).unwrap();
        let plan = build_plan(&request(), &graph, &local_policy()).unwrap();

        let ai_steps: Vec<&Step> = plan
            .steps
            .iter()
            .filter(|s| matches!(s, Step::AiBuild(_)))
            .collect();
        assert_eq!(ai_steps.len(), 1);
        assert_eq!(ai_steps[0].id(), "step-000-select-decide");

        if let Step::AiBuild(ai) = ai_steps[0] {
            assert!(ai.prompt.contains("formatted sources"));
            assert!(ai.prompt.contains("'select'"));
            assert_eq!(ai.output_schema, TOOL_SELECTION_SCHEMA);
        }
    }

    #[test]
    fn embedded_invocation_yields_tool_step_and_artifacts() {
        let graph = parse_graph(GRAPH).unwrap();
        let plan = build_plan(&request(), &graph, &local_policy()).unwrap();

        let tool_steps: Vec<&Step> = plan
            .steps
            .iter()
            .filter(|s| matches!(s, Step::ToolBuild(_)))
            .collect();
        assert_eq!(tool_steps.len(), 1);
        assert_eq!(tool_steps[0].id(), "step-001-build-invoke");

        assert_eq!(plan.artifacts.len(), 1);
        assert_eq!(plan.artifacts[0].artifact_id, "step-001-build-invoke:report");
    }

    // ── Validation failures ──────────────────────────────────────────────────

    #[test]
    fn missing_rule_fails_plan_construction() {
        let graph = parse_graph(GRAPH).unwrap();
        let mut req = request();
        req.rules.retain(|r| r.node_id != "build");

        let err = build_plan(&req, &graph, &local_policy()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RouteRuleMissing);
    }

    #[test]
    fn terminate_on_start_node_is_rejected() {
        let graph = parse_graph(GRAPH).unwrap();
        let mut req = request();
        for r in &mut req.rules {
            if r.node_id == "select" {
                r.intent = RouteIntent::Terminate;
            }
        }

        let err = build_plan(&req, &graph, &local_policy()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanStartInvalid);
    }

    #[test]
    fn next_ids_must_be_graph_successors() {
        let graph = parse_graph(GRAPH).unwrap();
        let mut req = request();
        for r in &mut req.rules {
            if r.node_id == "select" {
                r.next = vec!["done".to_string()];
            }
        }

        let err = build_plan(&req, &graph, &local_policy()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RouteRuleMismatch);
    }

    #[test]
    fn rule_kind_must_match_graph_kind() {
        let graph = parse_graph(GRAPH).unwrap();
        let mut req = request();
        for r in &mut req.rules {
            if r.node_id == "build" {
                r.node_kind = NodeKind::Route;
            }
        }

        let err = build_plan(&req, &graph, &local_policy()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RouteRuleMismatch);
    }

    // ── Initial state ────────────────────────────────────────────────────────

    #[test]
    fn initial_state_is_pending_at_the_start_node() {
        let graph = parse_graph(GRAPH).unwrap();
        let plan = build_plan(&request(), &graph, &local_policy()).unwrap();

        let state = initial_state(&plan).unwrap();
        assert_eq!(state.node_id, "select");
        assert_eq!(state.intent, RouteIntent::SelectTool);
        assert_eq!(state.status, RouteStatus::Pending);
        assert_eq!(state.work_order_id, WorkOrderId::new("wo-builder"));
    }
}
