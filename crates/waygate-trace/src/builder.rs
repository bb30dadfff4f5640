//! The trace builder.
//!
//! Wraps an append-only entry list behind appenders that stamp each entry
//! with the next tick. A builder starts fresh at tick 0 or is seeded from
//! a persisted trace, in which case all prior entries are reused and new
//! ticks continue from one past the maximum seen.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use waygate_contracts::error::WaygateError;
use waygate_contracts::plan::ToolResult;
use waygate_contracts::route::RoutingState;
use waygate_contracts::step::Step;

use crate::entry::{RoutingTrace, RoutingTraceEntry, TraceEventKind};

/// Accumulates trace entries for one routing run.
pub struct TraceBuilder {
    run_id: Uuid,
    plan_id: String,
    catalog_hash: String,
    entries: Vec<RoutingTraceEntry>,
    next_tick: u64,
    /// True when this builder was seeded from a persisted trace.
    resumed: bool,
}

impl TraceBuilder {
    /// Start a fresh trace for the given plan and catalog snapshot.
    pub fn new(plan_id: impl Into<String>, catalog_hash: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            plan_id: plan_id.into(),
            catalog_hash: catalog_hash.into(),
            entries: Vec::new(),
            next_tick: 0,
            resumed: false,
        }
    }

    /// Seed a builder from a persisted trace.
    ///
    /// Prior entries are reused verbatim; new ticks continue from
    /// `max(existing tick) + 1`. The prior trace is never edited.
    pub fn resume(trace: RoutingTrace) -> Self {
        let next_tick = trace.max_tick().map(|tick| tick + 1).unwrap_or(0);
        debug!(
            run_id = %trace.run_id,
            entries = trace.entries.len(),
            next_tick,
            "trace builder resumed"
        );
        Self {
            run_id: trace.run_id,
            plan_id: trace.plan_id,
            catalog_hash: trace.catalog_hash,
            entries: trace.entries,
            next_tick,
            resumed: true,
        }
    }

    /// True when this builder continues a persisted trace.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn catalog_hash(&self) -> &str {
        &self.catalog_hash
    }

    /// The tick the next appended entry will carry.
    pub fn next_tick(&self) -> u64 {
        self.next_tick
    }

    fn push(&mut self, mut entry: RoutingTraceEntry) -> u64 {
        let tick = self.next_tick;
        entry.tick = tick;
        self.entries.push(entry);
        self.next_tick += 1;
        tick
    }

    /// Append a bare event.
    pub fn append(&mut self, kind: TraceEventKind) -> u64 {
        self.push(RoutingTraceEntry {
            tick: 0,
            kind,
            detail: None,
            state: None,
            step: None,
            error: None,
            result: None,
        })
    }

    /// Append an event with free-text detail.
    pub fn append_detail(&mut self, kind: TraceEventKind, detail: impl Into<String>) -> u64 {
        self.push(RoutingTraceEntry {
            tick: 0,
            kind,
            detail: Some(detail.into()),
            state: None,
            step: None,
            error: None,
            result: None,
        })
    }

    /// Append an event with a state snapshot and, optionally, the step it
    /// concerns.
    pub fn append_state(
        &mut self,
        kind: TraceEventKind,
        state: &RoutingState,
        step: Option<&Step>,
    ) -> u64 {
        self.push(RoutingTraceEntry {
            tick: 0,
            kind,
            detail: None,
            state: Some(state.clone()),
            step: step.cloned(),
            error: None,
            result: None,
        })
    }

    /// Append an event carrying an error, with the halted state when known.
    pub fn append_error(
        &mut self,
        kind: TraceEventKind,
        error: &WaygateError,
        state: Option<&RoutingState>,
    ) -> u64 {
        self.push(RoutingTraceEntry {
            tick: 0,
            kind,
            detail: Some(error.detail.clone()),
            state: state.cloned(),
            step: None,
            error: Some(error.clone()),
            result: None,
        })
    }

    /// Append a `ToolResult` event carrying the executor's report.
    pub fn append_result(&mut self, result: &ToolResult) -> u64 {
        self.push(RoutingTraceEntry {
            tick: 0,
            kind: TraceEventKind::ToolResult,
            detail: Some(format!("tool '{}' success={}", result.tool_id, result.success)),
            state: None,
            step: None,
            error: None,
            result: Some(result.clone()),
        })
    }

    /// Export the accumulated history. The builder can keep appending
    /// afterwards; the export is a snapshot.
    pub fn export(&self) -> RoutingTrace {
        RoutingTrace {
            run_id: self.run_id,
            plan_id: self.plan_id.clone(),
            catalog_hash: self.catalog_hash.clone(),
            recorded_at: Utc::now(),
            entries: self.entries.clone(),
        }
    }
}
