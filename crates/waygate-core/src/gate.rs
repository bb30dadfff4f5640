//! The routing gate: the pure transition function of the state machine.
//!
//! `advance()` takes the plan, the current state, an optional proposed
//! decision, and a registry snapshot, and returns the next state together
//! with an optional error. It never mutates its inputs and touches no
//! shared state; the narrator parameter is observational only.
//!
//! Check order on every call:
//!
//!   1. Final states are absorbing
//!   2. The current node must resolve to a route step
//!   3. Work order ids on plan, state, and step must agree
//!   4. The step must match its rule (intent and owner)
//!   5. Plans with tool steps pass authority pre-flight before any
//!      node-level work
//!   6. Decisions are only acceptable at an Ai-owned `SelectTool` step
//!      with a token bound to exactly this context
//!   7. An accepted decision's tool must exist, be dominated by the plan
//!      authority, and have complete, known bindings
//!
//! Every rejected transition returns both the halted (or, for final
//! states, unchanged) state and a populated error. Nothing is swallowed.

use tracing::{debug, warn};

use waygate_contracts::error::{ErrorCode, WaygateError};
use waygate_contracts::plan::BuildPlan;
use waygate_contracts::route::{
    DecisionOwner, NodeKind, RouteDecision, RouteIntent, RouteStatus, RoutingState,
};
use waygate_contracts::step::RouteStep;
use waygate_plan::intent_token;
use waygate_registry::{validate_invocation, validate_plan_authority, ToolRegistrySnapshot};

use crate::traits::{Narrator, NarratorEvent};

/// The result of one gate call: the next state, plus the error behind it
/// when the transition was rejected.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub state: RoutingState,
    pub error: Option<WaygateError>,
}

impl GateOutcome {
    fn ok(state: RoutingState) -> Self {
        Self { state, error: None }
    }

    fn rejected(state: RoutingState, error: WaygateError) -> Self {
        Self {
            state,
            error: Some(error),
        }
    }
}

/// Halt at the current node and tell the narrator why.
fn halt(state: &RoutingState, error: WaygateError, narrator: &dyn Narrator) -> GateOutcome {
    warn!(
        node = %state.node_id,
        code = error.code.as_str(),
        detail = %error.detail,
        "gate halted"
    );
    narrator.narrate(NarratorEvent::Halted {
        node_id: &state.node_id,
        code: error.code,
    });
    GateOutcome::rejected(state.with_status(RouteStatus::Halted), error)
}

/// Advance the state machine by one transition.
pub fn advance(
    plan: &BuildPlan,
    state: &RoutingState,
    decision: Option<&RouteDecision>,
    registry: &ToolRegistrySnapshot,
    narrator: &dyn Narrator,
) -> GateOutcome {
    // ── 1. Final states are absorbing ────────────────────────────────────────
    //
    // Status is left unchanged: a completed run stays completed even when
    // poked again.
    if state.is_final() {
        return GateOutcome::rejected(
            state.clone(),
            WaygateError::new(
                ErrorCode::RouteStateFinal,
                format!("state at node '{}' is final ({:?})", state.node_id, state.status),
            ),
        );
    }

    narrator.narrate(NarratorEvent::RouteEntered {
        node_id: &state.node_id,
    });

    // ── 2. Resolve the current route step ────────────────────────────────────
    let step = match plan.route_step_at(&state.node_id) {
        Some(step) => step,
        None => {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteStepOutOfRange,
                    format!("no route step for node '{}'", state.node_id),
                ),
                narrator,
            );
        }
    };

    // ── 3. Work order agreement across plan, state, and step ────────────────
    let plan_wo = &plan.request.work_order.id;
    if plan_wo != &state.work_order_id || plan_wo != &step.work_order_id {
        return halt(
            state,
            WaygateError::new(
                ErrorCode::RouteWorkorderMismatch,
                format!(
                    "work order disagreement: plan '{}', state '{}', step '{}'",
                    plan_wo.as_str(),
                    state.work_order_id.as_str(),
                    step.work_order_id.as_str()
                ),
            ),
            narrator,
        );
    }

    // ── 4. The step must match its rule ──────────────────────────────────────
    let rule = match plan.request.rule_for(&state.node_id) {
        Some(rule) => rule,
        None => {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteRuleMissing,
                    format!("no route rule for node '{}'", state.node_id),
                ),
                narrator,
            );
        }
    };
    if step.intent != rule.intent || step.owner != rule.owner {
        return halt(
            state,
            WaygateError::new(
                ErrorCode::RouteRuleMismatch,
                format!(
                    "step at node '{}' declares {}/{} but the rule says {}/{}",
                    state.node_id,
                    step.intent.as_str(),
                    step.owner.as_str(),
                    rule.intent.as_str(),
                    rule.owner.as_str()
                ),
            ),
            narrator,
        );
    }

    // ── 5. Authority pre-flight ──────────────────────────────────────────────
    //
    // Runs against the whole plan before any node-level work proceeds, so
    // an under-authorized tool step halts the run at the earliest gate
    // call, not when the step is reached.
    if plan.has_tool_steps() {
        if let Err(error) = validate_plan_authority(plan, registry) {
            return halt(state, error, narrator);
        }
    }

    let expected_token = intent_token(
        &plan.request.work_order,
        &step.node_id,
        &step.id,
        step.tool.as_ref(),
    );

    // ── 6. Decision gating ───────────────────────────────────────────────────
    //
    // Tool selection is the one non-deterministic hop; every other intent
    // rejects external influence outright.
    if let Some(proposed) = decision {
        if step.intent != RouteIntent::SelectTool {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteDecisionUnexpected,
                    format!(
                        "decision proposed while intent is '{}' at node '{}'",
                        step.intent.as_str(),
                        state.node_id
                    ),
                ),
                narrator,
            );
        }
        if proposed.claimed_intent != RouteIntent::SelectTool {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteDecisionUnexpected,
                    format!(
                        "decision claims intent '{}' instead of select-tool",
                        proposed.claimed_intent.as_str()
                    ),
                ),
                narrator,
            );
        }
        if proposed.token != expected_token {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteDecisionUnexpected,
                    "decision token does not bind to the current context",
                ),
                narrator,
            );
        }
        if step.owner != DecisionOwner::Ai {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteOwnerInvalid,
                    format!(
                        "decision attempted on a select-tool step owned by '{}'",
                        step.owner.as_str()
                    ),
                ),
                narrator,
            );
        }

        // ── 7. Validate the selected tool ────────────────────────────────────
        let spec = match registry.get(&proposed.tool_id) {
            Some(spec) => spec,
            None => {
                return halt(
                    state,
                    WaygateError::new(
                        ErrorCode::ToolMissing,
                        format!("selected tool '{}' is not in the catalog", proposed.tool_id),
                    ),
                    narrator,
                );
            }
        };
        if let Err(error) = validate_invocation(&proposed.bindings, spec, &plan.authority) {
            return halt(state, error, narrator);
        }

        narrator.narrate(NarratorEvent::DecisionAccepted {
            node_id: &state.node_id,
            tool_id: &proposed.tool_id,
        });
    } else if step.intent == RouteIntent::SelectTool {
        if step.owner != DecisionOwner::Ai {
            // A select-tool step that nobody may externally resolve can
            // never be satisfied.
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteOwnerInvalid,
                    format!(
                        "select-tool step at node '{}' is owned by '{}'",
                        state.node_id,
                        step.owner.as_str()
                    ),
                ),
                narrator,
            );
        }

        // Suspend for an external decision. Not an error.
        narrator.narrate(NarratorEvent::DecisionRequired {
            node_id: &state.node_id,
        });
        debug!(node = %state.node_id, "awaiting tool selection");
        return GateOutcome::ok(state.with_status(RouteStatus::Waiting));
    }

    // ── Advance ──────────────────────────────────────────────────────────────
    if rule.intent == RouteIntent::Terminate {
        if rule.node_kind != NodeKind::Terminal {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteRuleMismatch,
                    format!("terminate rule at non-terminal node '{}'", state.node_id),
                ),
                narrator,
            );
        }

        narrator.narrate(NarratorEvent::Completed {
            node_id: &state.node_id,
        });
        debug!(node = %state.node_id, "routing completed");
        return GateOutcome::ok(state.with_status(RouteStatus::Completed));
    }

    let next_step = match next_route_step(plan, rule.next.as_slice()) {
        Some(step) => step,
        None => {
            return halt(
                state,
                WaygateError::new(
                    ErrorCode::RouteRuleMismatch,
                    format!(
                        "rule at node '{}' allows no next node that resolves to a plan step",
                        state.node_id
                    ),
                ),
                narrator,
            );
        }
    };

    let token = intent_token(
        &plan.request.work_order,
        &next_step.node_id,
        &next_step.id,
        next_step.tool.as_ref(),
    );

    debug!(from = %state.node_id, to = %next_step.node_id, "node advanced");

    GateOutcome::ok(RoutingState::pending(
        state.work_order_id.clone(),
        token,
        next_step.node_id.clone(),
        next_step.intent,
    ))
}

/// The edge taken on advance: the lexicographically smallest allowed next
/// node that resolves to a route step in the plan.
fn next_route_step<'a>(plan: &'a BuildPlan, allowed: &[String]) -> Option<&'a RouteStep> {
    let mut candidates: Vec<&String> = allowed.iter().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .find_map(|node_id| plan.route_step_at(node_id))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use waygate_contracts::authority::ProviderKind;
    use waygate_contracts::route::{NodeKind, RouteIntentToken, RouteRule};
    use waygate_contracts::work_order::{WorkOrder, WorkOrderId};
    use waygate_graph::parse_graph;
    use waygate_plan::{build_plan, initial_state, BuildRequest, StaticDelegationPolicy};
    use waygate_registry::load_catalog;

    use crate::narrate::NoopNarrator;

    use super::*;

    // ── Fixture helpers ──────────────────────────────────────────────────────

    const GRAPH: &str = "select:::start --> terminate:::terminal";

    const CATALOG: &str = r#"{
      "tools": [
        {
          "toolId": "fmt",
          "description": "Format workspace sources",
          "authority": { "providerKind": "Local", "capabilities": ["workspace:write"] },
          "inputs": [
            { "name": "target", "type": "string", "required": true, "description": "What to format" }
          ],
          "outputs": [
            { "name": "report", "type": "string", "description": "Formatting report" }
          ]
        },
        {
          "toolId": "fetch",
          "description": "Fetch a remote artifact",
          "authority": { "providerKind": "Remote", "capabilities": ["net:egress"] },
          "inputs": [
            { "name": "url", "type": "string", "required": true, "description": "Source URL" }
          ],
          "outputs": [
            { "name": "artifact", "type": "string", "description": "Fetched artifact" }
          ]
        }
      ]
    }"#;

    fn work_order() -> WorkOrder {
        WorkOrder {
            id: WorkOrderId::new("wo-gate"),
            request: "format everything".to_string(),
            goal: "formatted workspace".to_string(),
            constraints: vec!["no network".to_string()],
            success_criteria: vec!["formatter exits zero".to_string()],
        }
    }

    fn select_rule(owner: DecisionOwner) -> RouteRule {
        RouteRule {
            node_id: "select".to_string(),
            intent: RouteIntent::SelectTool,
            owner,
            output_kind: "selection".to_string(),
            node_kind: NodeKind::Start,
            next: vec!["terminate".to_string()],
            tool: None,
        }
    }

    fn terminate_rule() -> RouteRule {
        RouteRule {
            node_id: "terminate".to_string(),
            intent: RouteIntent::Terminate,
            owner: DecisionOwner::Rule,
            output_kind: "none".to_string(),
            node_kind: NodeKind::Terminal,
            next: vec![],
            tool: None,
        }
    }

    fn plan_with_owner(owner: DecisionOwner) -> BuildPlan {
        let graph = parse_graph(GRAPH).unwrap();
        let request = BuildRequest {
            command_id: "build".to_string(),
            work_order: work_order(),
            args: HashMap::new(),
            rules: vec![select_rule(owner), terminate_rule()],
        };
        let policy = StaticDelegationPolicy::new(waygate_contracts::authority::DelegationAuthority {
            provider_id: "builder-local".to_string(),
            kind: ProviderKind::Local,
            policy_id: "policy-gate".to_string(),
            allow_delegation: false,
        });
        build_plan(&request, &graph, &policy).unwrap()
    }

    fn plan() -> BuildPlan {
        plan_with_owner(DecisionOwner::Ai)
    }

    fn registry() -> ToolRegistrySnapshot {
        load_catalog(CATALOG).unwrap()
    }

    fn decision_for(plan: &BuildPlan, state: &RoutingState, tool_id: &str) -> RouteDecision {
        let step = plan.route_step_at(&state.node_id).unwrap();
        RouteDecision {
            tool_id: tool_id.to_string(),
            bindings: BTreeMap::from([("target".to_string(), "workspace".to_string())]),
            token: intent_token(
                &plan.request.work_order,
                &step.node_id,
                &step.id,
                step.tool.as_ref(),
            ),
            claimed_intent: RouteIntent::SelectTool,
        }
    }

    /// A narrator that records every event name it sees.
    struct RecordingNarrator {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingNarrator {
        fn new() -> Self {
            Self {
                events: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    impl Narrator for RecordingNarrator {
        fn narrate(&self, event: NarratorEvent<'_>) {
            let name = match event {
                NarratorEvent::RouteEntered { .. } => "route-entered",
                NarratorEvent::DecisionRequired { .. } => "decision-required",
                NarratorEvent::DecisionAccepted { .. } => "decision-accepted",
                NarratorEvent::Halted { .. } => "halted",
                NarratorEvent::Completed { .. } => "completed",
            };
            self.events.lock().unwrap().push(name.to_string());
        }
    }

    // ── The end-to-end scenario ──────────────────────────────────────────────

    /// Pending at `select` with no decision suspends; a valid selection
    /// advances to `terminate`; the next call completes the run.
    #[test]
    fn select_then_terminate_walkthrough() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let pending = initial_state(&plan).unwrap();
        assert_eq!(pending.status, RouteStatus::Pending);
        assert_eq!(pending.node_id, "select");

        // No decision: the gate suspends rather than erring.
        let waiting = advance(&plan, &pending, None, &registry, &narrator);
        assert!(waiting.error.is_none());
        assert_eq!(waiting.state.status, RouteStatus::Waiting);
        assert_eq!(waiting.state.node_id, "select");

        // A valid selection advances to the terminal node.
        let decision = decision_for(&plan, &waiting.state, "fmt");
        let advanced = advance(&plan, &waiting.state, Some(&decision), &registry, &narrator);
        assert!(advanced.error.is_none(), "unexpected: {:?}", advanced.error);
        assert_eq!(advanced.state.node_id, "terminate");
        assert_eq!(advanced.state.status, RouteStatus::Pending);

        // One more call, no decision: the run completes.
        let done = advance(&plan, &advanced.state, None, &registry, &narrator);
        assert!(done.error.is_none());
        assert_eq!(done.state.status, RouteStatus::Completed);
    }

    // ── Absorbing terminal states ────────────────────────────────────────────

    #[test]
    fn completed_state_is_absorbing() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let completed = initial_state(&plan)
            .unwrap()
            .with_status(RouteStatus::Completed);
        let outcome = advance(&plan, &completed, None, &registry, &narrator);

        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteStateFinal);
        assert_eq!(outcome.state.status, RouteStatus::Completed, "status never mutates");
    }

    #[test]
    fn halted_state_is_absorbing() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let halted = initial_state(&plan).unwrap().with_status(RouteStatus::Halted);
        let outcome = advance(&plan, &halted, None, &registry, &narrator);

        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteStateFinal);
        assert_eq!(outcome.state.status, RouteStatus::Halted);
    }

    // ── Decision binding ─────────────────────────────────────────────────────

    /// A decision at a non-select intent always halts, even when the tool
    /// itself would be perfectly valid.
    #[test]
    fn decision_outside_select_tool_is_unexpected() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        // Advance to the terminate node first.
        let pending = initial_state(&plan).unwrap();
        let waiting = advance(&plan, &pending, None, &registry, &narrator).state;
        let decision = decision_for(&plan, &waiting, "fmt");
        let at_terminate = advance(&plan, &waiting, Some(&decision), &registry, &narrator).state;
        assert_eq!(at_terminate.node_id, "terminate");

        // Proposing a (valid) decision at the terminate step halts.
        let stale = RouteDecision {
            token: intent_token(
                &plan.request.work_order,
                "terminate",
                plan.route_step_at("terminate").unwrap().id.as_str(),
                None,
            ),
            ..decision
        };
        let outcome = advance(&plan, &at_terminate, Some(&stale), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteDecisionUnexpected);
        assert_eq!(outcome.state.status, RouteStatus::Halted);
    }

    #[test]
    fn mismatched_token_is_unexpected() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;

        let mut decision = decision_for(&plan, &waiting, "fmt");
        decision.token = RouteIntentToken {
            constraint_hash: "0".repeat(64),
            context_hash: "1".repeat(64),
        };

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteDecisionUnexpected);
    }

    #[test]
    fn wrong_claimed_intent_is_unexpected() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;

        let mut decision = decision_for(&plan, &waiting, "fmt");
        decision.claimed_intent = RouteIntent::Review;

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteDecisionUnexpected);
    }

    #[test]
    fn non_ai_owner_rejects_decisions() {
        let plan = plan_with_owner(DecisionOwner::Human);
        let registry = registry();
        let narrator = NoopNarrator;

        let pending = initial_state(&plan).unwrap();
        let decision = decision_for(&plan, &pending, "fmt");

        let outcome = advance(&plan, &pending, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteOwnerInvalid);
    }

    // ── Tool validation on acceptance ────────────────────────────────────────

    #[test]
    fn unknown_tool_halts() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;
        let decision = decision_for(&plan, &waiting, "chisel");

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ToolMissing);
    }

    /// A Local plan may not select the Remote-only fetch tool.
    #[test]
    fn under_authorized_tool_halts() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;
        let mut decision = decision_for(&plan, &waiting, "fetch");
        decision.bindings = BTreeMap::from([("url".to_string(), "https://example.test".to_string())]);

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ToolAuthorityDenied);
    }

    #[test]
    fn missing_required_binding_halts() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;
        let mut decision = decision_for(&plan, &waiting, "fmt");
        decision.bindings = BTreeMap::new();

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ToolBindingsMissing);
    }

    #[test]
    fn unknown_binding_key_halts() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let waiting = advance(&plan, &initial_state(&plan).unwrap(), None, &registry, &narrator).state;
        let mut decision = decision_for(&plan, &waiting, "fmt");
        decision
            .bindings
            .insert("verbose".to_string(), "true".to_string());

        let outcome = advance(&plan, &waiting, Some(&decision), &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ToolBindingUnknown);
    }

    // ── Structural invariants ────────────────────────────────────────────────

    #[test]
    fn foreign_work_order_halts() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let mut state = initial_state(&plan).unwrap();
        state.work_order_id = WorkOrderId::new("wo-other");

        let outcome = advance(&plan, &state, None, &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteWorkorderMismatch);
        assert_eq!(outcome.state.status, RouteStatus::Halted);
    }

    #[test]
    fn unknown_node_halts_out_of_range() {
        let plan = plan();
        let registry = registry();
        let narrator = NoopNarrator;

        let mut state = initial_state(&plan).unwrap();
        state.node_id = "elsewhere".to_string();

        let outcome = advance(&plan, &state, None, &registry, &narrator);
        assert_eq!(outcome.error.unwrap().code, ErrorCode::RouteStepOutOfRange);
    }

    // ── Narration ────────────────────────────────────────────────────────────

    #[test]
    fn narrator_sees_the_lifecycle() {
        let plan = plan();
        let registry = registry();
        let narrator = RecordingNarrator::new();
        let events = narrator.events.clone();

        let pending = initial_state(&plan).unwrap();
        let waiting = advance(&plan, &pending, None, &registry, &narrator).state;
        let decision = decision_for(&plan, &waiting, "fmt");
        let advanced = advance(&plan, &waiting, Some(&decision), &registry, &narrator).state;
        advance(&plan, &advanced, None, &registry, &narrator);

        let seen = events.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "route-entered",
                "decision-required",
                "route-entered",
                "decision-accepted",
                "route-entered",
                "completed",
            ]
        );
    }
}
