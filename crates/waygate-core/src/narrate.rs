//! Reference narrator implementations.

use tracing::info;

use crate::traits::{Narrator, NarratorEvent};

/// A narrator that ignores every event. The default for tests and for
/// embedders that do not observe lifecycle events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNarrator;

impl Narrator for NoopNarrator {
    fn narrate(&self, _event: NarratorEvent<'_>) {}
}

/// A narrator that forwards lifecycle events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNarrator;

impl Narrator for TracingNarrator {
    fn narrate(&self, event: NarratorEvent<'_>) {
        match event {
            NarratorEvent::RouteEntered { node_id } => {
                info!(node = node_id, "route entered");
            }
            NarratorEvent::DecisionRequired { node_id } => {
                info!(node = node_id, "decision required");
            }
            NarratorEvent::DecisionAccepted { node_id, tool_id } => {
                info!(node = node_id, tool = tool_id, "decision accepted");
            }
            NarratorEvent::Halted { node_id, code } => {
                info!(node = node_id, code = code.as_str(), "routing halted");
            }
            NarratorEvent::Completed { node_id } => {
                info!(node = node_id, "routing completed");
            }
        }
    }
}
