//! # waygate-core
//!
//! The routing gate and loop for the Waygate runtime.
//!
//! This crate provides:
//! - The four collaborator traits (`DecisionProvider`, `ToolExecutor`,
//!   `PlanStore`, `Narrator`)
//! - The pure gate transition function (`gate::advance`)
//! - The `RoutingLoop` that drives the gate, requests decisions, executes
//!   validated tools, and records every observable event in a trace
//! - Reference implementations: `InMemoryPlanStore`, `NoopNarrator`,
//!   `TracingNarrator`
//!
//! The security ordering is absolute: no externally proposed decision can
//! advance the state machine unless the current step is an Ai-owned
//! `SelectTool` step, the decision's intent token binds to exactly that
//! context, and the plan's granted authority dominates the selected tool.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waygate_core::{RoutingLoop, NoopNarrator};
//!
//! let routing = RoutingLoop::new(&provider, &executor, &NoopNarrator);
//! let outcome = routing.run(&plan, &registry, state, &mut trace)?;
//! ```

pub mod gate;
pub mod narrate;
pub mod runner;
pub mod store;
pub mod traits;

pub use gate::{advance, GateOutcome};
pub use narrate::{NoopNarrator, TracingNarrator};
pub use runner::{LoopOutcome, RoutingLoop};
pub use store::InMemoryPlanStore;
pub use traits::{
    DecisionContext, DecisionProvider, ExecutionEnvelope, Narrator, NarratorEvent, PlanStore,
    ToolExecutor,
};
