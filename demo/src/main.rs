//! Waygate Routing Runtime — Demo CLI
//!
//! Runs one or all of the three routing demo scenarios.  Each scenario uses
//! real Waygate components (graph compiler, plan builder, TOML delegation
//! policy, registry, gate, loop, trace) wired to scripted decision and tool
//! collaborators.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- complete
//!   cargo run -p demo -- pause-resume
//!   cargo run -p demo -- authority-denied

use std::collections::BTreeMap;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use waygate_contracts::error::WaygateResult;
use waygate_contracts::plan::{BuildPlan, ToolResult};
use waygate_contracts::route::{
    DecisionOwner, NodeKind, RouteDecision, RouteIntent, RouteRule,
};
use waygate_contracts::step::ToolInvocation;
use waygate_contracts::tool::ToolSpec;
use waygate_contracts::work_order::{WorkOrder, WorkOrderId};
use waygate_core::{
    DecisionContext, DecisionProvider, ExecutionEnvelope, InMemoryPlanStore, LoopOutcome,
    PlanStore, RoutingLoop, ToolExecutor, TracingNarrator,
};
use waygate_graph::parse_graph;
use waygate_plan::{build_plan, initial_state, intent_token, BuildRequest, TomlDelegationPolicy};
use waygate_registry::load_catalog;
use waygate_trace::{recover_state, verify_resumable, TraceBuilder};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Waygate — deterministic build-plan routing demo.
///
/// Each subcommand runs one or all of the three routing scenarios,
/// demonstrating decision gating, tool authority enforcement, and
/// trace-based pause/resume.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Waygate routing runtime demo",
    long_about = "Runs Waygate demo scenarios showing canonical planning, decision\n\
                  gating, tool authority validation, and trace-based resumption."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three routing scenarios in sequence.
    RunAll,
    /// Scenario 1: a run that selects a tool and completes.
    Complete,
    /// Scenario 2: a run that waits, persists, and resumes from its trace.
    PauseResume,
    /// Scenario 3: a selection denied by the plan's authority grant.
    AuthorityDenied,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Complete => scenario_complete(),
        Command::PauseResume => scenario_pause_resume(),
        Command::AuthorityDenied => scenario_authority_denied(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_all() -> WaygateResult<()> {
    scenario_complete()?;
    scenario_pause_resume()?;
    scenario_authority_denied()?;
    Ok(())
}

// ── Shared fixtures ───────────────────────────────────────────────────────────

const GRAPH: &str = "select:::start --> terminate:::terminal";

const GRANTS: &str = r#"
[[grants]]
id = "demo-local"
description = "Demo builds run with local workspace authority"
command = "demo-build"
provider_id = "demo-builder"
provider_kind = "Local"
"#;

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

fn demo_plan() -> WaygateResult<BuildPlan> {
    let graph = parse_graph(GRAPH)?;
    let policy = TomlDelegationPolicy::from_toml_str(GRANTS)?;
    let request = BuildRequest {
        command_id: "demo-build".to_string(),
        work_order: WorkOrder {
            id: WorkOrderId::new("wo-demo"),
            request: "format the demo workspace".to_string(),
            goal: "a formatted workspace".to_string(),
            constraints: vec!["stay offline".to_string()],
            success_criteria: vec!["formatter exits zero".to_string()],
        },
        args: std::collections::HashMap::new(),
        rules: vec![
            RouteRule {
                node_id: "select".to_string(),
                intent: RouteIntent::SelectTool,
                owner: DecisionOwner::Ai,
                output_kind: "selection".to_string(),
                node_kind: NodeKind::Start,
                next: vec!["terminate".to_string()],
                tool: None,
            },
            RouteRule {
                node_id: "terminate".to_string(),
                intent: RouteIntent::Terminate,
                owner: DecisionOwner::Rule,
                output_kind: "none".to_string(),
                node_kind: NodeKind::Terminal,
                next: vec![],
                tool: None,
            },
        ],
    };
    build_plan(&request, &graph, &policy)
}

/// Build a decision bound to the plan's `select` step.
fn selection(plan: &BuildPlan, tool_id: &str, bindings: BTreeMap<String, String>) -> RouteDecision {
    let step = plan
        .route_step_at("select")
        .expect("demo plan has a select step");
    RouteDecision {
        tool_id: tool_id.to_string(),
        bindings,
        token: intent_token(
            &plan.request.work_order,
            &step.node_id,
            &step.id,
            step.tool.as_ref(),
        ),
        claimed_intent: RouteIntent::SelectTool,
    }
}

// ── Scripted collaborators ────────────────────────────────────────────────────

/// Serves queued decisions in order, then answers "not yet".
struct ScriptedProvider {
    script: Mutex<Vec<RouteDecision>>,
}

impl ScriptedProvider {
    fn new(script: Vec<RouteDecision>) -> Self {
        Self {
            script: Mutex::new(script),
        }
    }

    fn refusing() -> Self {
        Self::new(vec![])
    }
}

impl DecisionProvider for ScriptedProvider {
    fn decide(&self, _ctx: &DecisionContext<'_>) -> WaygateResult<Option<RouteDecision>> {
        let mut script = self.script.lock().expect("script lock poisoned");
        if script.is_empty() {
            Ok(None)
        } else {
            Ok(Some(script.remove(0)))
        }
    }
}

/// Pretends to run tools; echoes one output per declared output name.
struct EchoExecutor;

impl ToolExecutor for EchoExecutor {
    fn execute(&self, invocation: &ToolInvocation, spec: &ToolSpec) -> WaygateResult<ToolResult> {
        let outputs = spec
            .outputs
            .iter()
            .map(|output| (output.name.clone(), format!("{} ok", invocation.tool_id)))
            .collect();
        Ok(ToolResult {
            tool_id: invocation.tool_id.clone(),
            success: true,
            failure_code: None,
            outputs,
        })
    }
}

// ── Scenario 1: straight run to completion ────────────────────────────────────

fn scenario_complete() -> WaygateResult<()> {
    println!("=== Scenario 1: Select and Complete ===");
    println!();

    let plan = demo_plan()?;
    let registry = load_catalog(CATALOG)?;
    println!("  plan id       {}", plan.plan_id);
    println!("  catalog hash  {}", registry.catalog_hash());

    let provider = ScriptedProvider::new(vec![selection(
        &plan,
        "fmt",
        BTreeMap::from([("target".to_string(), "workspace".to_string())]),
    )]);
    let narrator = TracingNarrator;
    let routing = RoutingLoop::new(&provider, &EchoExecutor, &narrator);

    let mut trace = TraceBuilder::new(plan.plan_id.clone(), registry.catalog_hash());
    let outcome = routing.run(&plan, &registry, initial_state(&plan)?, &mut trace)?;

    match outcome {
        LoopOutcome::Completed(state) => {
            println!("  completed at node '{}'", state.node_id);
        }
        other => println!("  unexpected outcome: {:?}", other),
    }

    println!("  trace events:");
    for entry in &trace.export().entries {
        println!("    [{:02}] {}", entry.tick, entry.kind.as_str());
    }
    println!();
    Ok(())
}

// ── Scenario 2: pause, persist, resume ────────────────────────────────────────

fn scenario_pause_resume() -> WaygateResult<()> {
    println!("=== Scenario 2: Pause and Resume ===");
    println!();

    let plan = demo_plan()?;
    let registry = load_catalog(CATALOG)?;
    let store = InMemoryPlanStore::new();
    let narrator = TracingNarrator;

    // Leg one: the provider has no answer yet; the run suspends.
    let refusing = ScriptedProvider::refusing();
    let routing = RoutingLoop::new(&refusing, &EchoExecutor, &narrator);
    let mut trace = TraceBuilder::new(plan.plan_id.clone(), registry.catalog_hash());
    let outcome = routing.run(&plan, &registry, initial_state(&plan)?, &mut trace)?;

    let waiting = match outcome {
        LoopOutcome::Waiting(state) => state,
        other => {
            println!("  unexpected outcome: {:?}", other);
            return Ok(());
        }
    };
    println!("  suspended at node '{}' awaiting a decision", waiting.node_id);

    store.save(&ExecutionEnvelope {
        plan: plan.clone(),
        trace: trace.export(),
    })?;

    // Leg two: reload, fail-closed check, resume with an answer.
    let envelope = store
        .load(&plan.plan_id)?
        .expect("envelope was just saved");
    verify_resumable(&envelope.trace, &plan.plan_id, registry.catalog_hash())?;
    let recovered = recover_state(&envelope.trace).expect("trace holds a resumable state");
    println!("  recovered state at node '{}'", recovered.node_id);

    let mut resumed = TraceBuilder::resume(envelope.trace);
    let provider = ScriptedProvider::new(vec![selection(
        &plan,
        "fmt",
        BTreeMap::from([("target".to_string(), "workspace".to_string())]),
    )]);
    let routing = RoutingLoop::new(&provider, &EchoExecutor, &narrator);
    let outcome = routing.run(&envelope.plan, &registry, recovered, &mut resumed)?;

    match outcome {
        LoopOutcome::Completed(state) => {
            println!(
                "  resumed and completed at node '{}' (final tick {})",
                state.node_id,
                resumed.export().max_tick().unwrap_or(0)
            );
        }
        other => println!("  unexpected outcome: {:?}", other),
    }
    println!();
    Ok(())
}

// ── Scenario 3: authority denial ──────────────────────────────────────────────

fn scenario_authority_denied() -> WaygateResult<()> {
    println!("=== Scenario 3: Authority Denied ===");
    println!();

    let plan = demo_plan()?;
    let registry = load_catalog(CATALOG)?;
    println!(
        "  plan authority is '{}'; tool 'fetch' requires Remote",
        plan.authority.kind.as_str()
    );

    // The provider selects the remote-only fetch tool under a Local grant.
    let provider = ScriptedProvider::new(vec![selection(
        &plan,
        "fetch",
        BTreeMap::from([("url".to_string(), "https://example.test/pkg".to_string())]),
    )]);
    let narrator = TracingNarrator;
    let routing = RoutingLoop::new(&provider, &EchoExecutor, &narrator);

    let mut trace = TraceBuilder::new(plan.plan_id.clone(), registry.catalog_hash());
    let outcome = routing.run(&plan, &registry, initial_state(&plan)?, &mut trace)?;

    match outcome {
        LoopOutcome::Halted(state, error) => {
            println!(
                "  halted at node '{}' with '{}' ({})",
                state.node_id,
                error.code.as_str(),
                error.detail
            );
        }
        other => println!("  unexpected outcome: {:?}", other),
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("WAYGATE — Deterministic Build-Plan Routing");
    println!("Routing Runtime Demo");
    println!("==========================================");
    println!();
    println!("Waygate pipeline per run:");
    println!("  [1] Graph text compiles to a canonical node order and structural hash");
    println!("  [2] The plan builder seals request + rules under a SHA-256 plan id");
    println!("  [3] The gate admits decisions only at Ai-owned select-tool steps");
    println!("  [4] Tool authority is validated before any invocation runs");
    println!("  [5] Every observable event lands in a tick-ordered, append-only trace");
    println!();
}
