//! # waygate-trace
//!
//! The append-only, tick-ordered event trace for Waygate routing runs.
//!
//! Every observable occurrence of a run is appended as a
//! `RoutingTraceEntry` with a strictly increasing tick, independent of
//! wall-clock time. A trace is immutable history: resuming a paused run
//! means seeding a new `TraceBuilder` with the prior entries and
//! continuing tick numbering from one past the maximum seen. Replay
//! reconstructs the routing state and prior tool results, after the
//! fail-closed `verify_resumable` check confirms neither the plan nor the
//! tool catalog drifted while the run was paused.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waygate_trace::{TraceBuilder, replay};
//!
//! let mut builder = TraceBuilder::resume(persisted);
//! replay::verify_resumable(&builder.export(), &plan.plan_id, snapshot.catalog_hash())?;
//! let state = replay::recover_state(&builder.export());
//! ```

pub mod builder;
pub mod entry;
pub mod replay;

pub use builder::TraceBuilder;
pub use entry::{RoutingTrace, RoutingTraceEntry, TraceEventKind};
pub use replay::{recover_state, recover_tool_results, verify_resumable};
