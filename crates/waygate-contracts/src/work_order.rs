//! Work order types.
//!
//! A `WorkOrder` is the immutable capsule of user intent a plan is built
//! from. Changing intent means reissuing a new work order with a new id,
//! never editing an existing one: the plan hash commits to every field
//! here, so mutation would silently change plan identity.

use serde::{Deserialize, Serialize};

/// Stable identifier for a work order.
///
/// Appears on the plan, on every routing state, and on every route step;
/// the gate refuses to advance when the three disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkOrderId(pub String);

impl WorkOrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The immutable user-intent capsule.
///
/// `constraints` and `success_criteria` are ordered: their order is part of
/// the plan's canonical identity and of the constraint half of every intent
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Stable id, chosen by the issuer.
    pub id: WorkOrderId,
    /// The original request text, verbatim.
    pub request: String,
    /// The distilled goal statement.
    pub goal: String,
    /// Ordered constraint strings.
    pub constraints: Vec<String>,
    /// Ordered success-criterion strings.
    pub success_criteria: Vec<String>,
}
