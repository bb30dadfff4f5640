//! The routing loop.
//!
//! Drives the gate until the run completes, halts, or suspends for an
//! external decision. The loop is single-threaded and synchronous: no step
//! begins until the previous transition and any tool execution have fully
//! returned. `Waiting` is a return-to-caller signal, not a blocking wait;
//! resumption is a fresh `run()` call with the persisted state, which is
//! also the cancellation mechanism, since a caller that never resumes
//! holds no resources here.

use tracing::{debug, info, warn};

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::BuildPlan;
use waygate_contracts::route::{RouteStatus, RoutingState};
use waygate_contracts::step::{RouteStep, Step, ToolInvocation};
use waygate_registry::ToolRegistrySnapshot;
use waygate_trace::{TraceBuilder, TraceEventKind};

use crate::gate;
use crate::traits::{DecisionContext, DecisionProvider, Narrator, ToolExecutor};

/// How a `run()` call ended.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The run reached a terminal node. Terminal: re-plan to run again.
    Completed(RoutingState),
    /// A routing invariant or tool failure stopped the run. Terminal.
    Halted(RoutingState, WaygateError),
    /// A decision is outstanding. Re-invoke `run()` later with this state.
    Waiting(RoutingState),
}

/// Drives one plan through the gate, recording every observable event.
pub struct RoutingLoop<'a> {
    provider: &'a dyn DecisionProvider,
    executor: &'a dyn ToolExecutor,
    narrator: &'a dyn Narrator,
}

impl<'a> RoutingLoop<'a> {
    pub fn new(
        provider: &'a dyn DecisionProvider,
        executor: &'a dyn ToolExecutor,
        narrator: &'a dyn Narrator,
    ) -> Self {
        Self {
            provider,
            executor,
            narrator,
        }
    }

    /// Run until `Completed`, `Halted`, or `Waiting`.
    ///
    /// `state` is the position to start from: a fresh plan's initial state
    /// or a state recovered from a persisted trace. A final state is
    /// rejected with `route_state_final`; a halted run must be re-planned,
    /// not re-run.
    pub fn run(
        &self,
        plan: &BuildPlan,
        registry: &ToolRegistrySnapshot,
        state: RoutingState,
        trace: &mut TraceBuilder,
    ) -> WaygateResult<LoopOutcome> {
        if state.is_final() {
            return Err(WaygateError::new(
                ErrorCode::RouteStateFinal,
                format!("cannot run from a final state ({:?})", state.status),
            ));
        }

        // A fresh trace opens with the plan resolution events. A resumed
        // trace already has them.
        if !trace.is_resumed() && trace.next_tick() == 0 {
            trace.append_detail(TraceEventKind::PlanResolved, plan.plan_id.clone());
            trace.append_detail(
                TraceEventKind::CommandDispatched,
                plan.request.command_id.clone(),
            );
        }

        let mut current = state;
        loop {
            let step = match plan.route_step_at(&current.node_id) {
                Some(step) => step.clone(),
                None => {
                    // Let the gate produce the canonical halt for this.
                    let outcome = gate::advance(plan, &current, None, registry, self.narrator);
                    let error = outcome.error.unwrap_or_else(|| {
                        WaygateError::new(ErrorCode::RouteStepOutOfRange, "unresolvable node")
                    });
                    return Ok(self.halt(outcome.state, error, trace));
                }
            };

            trace.append_state(
                TraceEventKind::RouteEntered,
                &current,
                Some(&Step::Route(step.clone())),
            );

            // First advance without a decision.
            let outcome = gate::advance(plan, &current, None, registry, self.narrator);
            if let Some(error) = outcome.error {
                return Ok(self.halt(outcome.state, error, trace));
            }

            match outcome.state.status {
                RouteStatus::Completed => {
                    trace.append_state(TraceEventKind::RunCompleted, &outcome.state, None);
                    info!(plan_id = %plan.plan_id, "routing run completed");
                    return Ok(LoopOutcome::Completed(outcome.state));
                }

                RouteStatus::Waiting => {
                    trace.append_state(TraceEventKind::DecisionRequired, &outcome.state, None);

                    match self.request_decision(plan, registry, &step, &outcome.state, trace)? {
                        DecisionFlow::StillWaiting(waiting) => {
                            debug!(node = %waiting.node_id, "no decision available; suspending");
                            return Ok(LoopOutcome::Waiting(waiting));
                        }
                        DecisionFlow::Halted(halted, error) => {
                            return Ok(self.halt(halted, error, trace));
                        }
                        DecisionFlow::Advanced(next) => {
                            trace.append_state(TraceEventKind::NodeAdvanced, &next, None);
                            current = next;
                        }
                    }
                }

                RouteStatus::Pending => {
                    trace.append_state(TraceEventKind::NodeAdvanced, &outcome.state, None);
                    current = outcome.state;
                }

                // The gate reports halts through its error channel, which
                // returned above.
                RouteStatus::Halted => {
                    let error = WaygateError::new(
                        ErrorCode::RouteStateFinal,
                        "gate produced a halted state without an error",
                    );
                    return Ok(self.halt(outcome.state, error, trace));
                }
            }
        }
    }

    /// Ask the decision provider, re-advance the gate, and execute the
    /// selected tool.
    fn request_decision(
        &self,
        plan: &BuildPlan,
        registry: &ToolRegistrySnapshot,
        step: &RouteStep,
        waiting: &RoutingState,
        trace: &mut TraceBuilder,
    ) -> WaygateResult<DecisionFlow> {
        let rule = plan.request.rule_for(&step.node_id);
        let allowed_next: &[String] = rule.map(|r| r.next.as_slice()).unwrap_or(&[]);

        let context = DecisionContext {
            work_order: &plan.request.work_order,
            step,
            graph_hash: &plan.graph_hash,
            catalog_hash: registry.catalog_hash(),
            allowed_next,
        };

        let decision = match self.provider.decide(&context)? {
            Some(decision) => decision,
            // Refusal and not-yet-available look the same here: keep
            // waiting, let the caller re-invoke with new input.
            None => return Ok(DecisionFlow::StillWaiting(waiting.clone())),
        };

        let outcome = gate::advance(plan, waiting, Some(&decision), registry, self.narrator);
        if let Some(error) = outcome.error {
            trace.append_error(TraceEventKind::DecisionRejected, &error, Some(&outcome.state));
            return Ok(DecisionFlow::Halted(outcome.state, error));
        }

        trace.append_detail(
            TraceEventKind::DecisionAccepted,
            format!("tool '{}' selected at node '{}'", decision.tool_id, step.node_id),
        );

        // The completed step was select-tool: execute the invocation it
        // carries, or the one the decision resolves to.
        let invocation = step.tool.clone().unwrap_or_else(|| {
            let outputs = registry
                .get(&decision.tool_id)
                .map(|spec| spec.outputs.iter().map(|o| o.name.clone()).collect())
                .unwrap_or_default();
            ToolInvocation {
                tool_id: decision.tool_id.clone(),
                bindings: decision.bindings.clone(),
                outputs,
            }
        });

        if let Some(error) = self.execute_tool(&invocation, registry, trace) {
            return Ok(DecisionFlow::Halted(
                waiting.with_status(RouteStatus::Halted),
                error,
            ));
        }

        Ok(DecisionFlow::Advanced(outcome.state))
    }

    /// Execute one invocation, record the `ToolExecuted`/`ToolResult`
    /// pair, and surface a failure as the halt error with a `code:tick`
    /// correlation id.
    fn execute_tool(
        &self,
        invocation: &ToolInvocation,
        registry: &ToolRegistrySnapshot,
        trace: &mut TraceBuilder,
    ) -> Option<WaygateError> {
        let spec = match registry.get(&invocation.tool_id) {
            Some(spec) => spec,
            None => {
                // The gate validated the selection; reaching this means the
                // snapshot changed mid-run, which it cannot.
                return Some(WaygateError::new(
                    ErrorCode::ToolMissing,
                    format!("tool '{}' vanished from the snapshot", invocation.tool_id),
                ));
            }
        };

        let tick = trace.append_detail(TraceEventKind::ToolExecuted, invocation.tool_id.clone());

        let result = match self.executor.execute(invocation, spec) {
            Ok(result) => result,
            Err(error) => {
                warn!(tool = %invocation.tool_id, code = error.code.as_str(), "executor fault");
                return Some(error.with_correlation(tick));
            }
        };

        trace.append_result(&result);

        if !result.success {
            let code = result.failure_code.unwrap_or(ErrorCode::ToolExecutionFailed);
            let error = WaygateError::new(
                code,
                format!("tool '{}' reported failure", invocation.tool_id),
            )
            .with_correlation(tick);
            warn!(tool = %invocation.tool_id, code = code.as_str(), "tool failed; halting run");
            return Some(error);
        }

        debug!(tool = %invocation.tool_id, "tool executed");
        None
    }

    fn halt(
        &self,
        state: RoutingState,
        error: WaygateError,
        trace: &mut TraceBuilder,
    ) -> LoopOutcome {
        trace.append_error(TraceEventKind::NodeHalted, &error, Some(&state));
        trace.append_error(TraceEventKind::RunHalted, &error, Some(&state));
        warn!(code = error.code.as_str(), detail = %error.detail, "routing run halted");
        LoopOutcome::Halted(state, error)
    }
}

/// Internal result of one decision round.
enum DecisionFlow {
    StillWaiting(RoutingState),
    Halted(RoutingState, WaygateError),
    Advanced(RoutingState),
}

// ── Tests ────────────────────────────────────────────────────────────────────
