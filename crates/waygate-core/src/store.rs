//! In-memory implementation of `PlanStore`.
//!
//! The reference persistence backend: a map from plan id to envelope
//! behind a `Mutex`, safe to share across threads via clones of the inner
//! `Arc`. Read-your-writes consistency holds trivially.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};

use crate::traits::{ExecutionEnvelope, PlanStore};

/// An in-memory, per-process plan store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanStore {
    envelopes: Arc<Mutex<HashMap<String, ExecutionEnvelope>>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of envelopes currently stored.
    pub fn len(&self) -> usize {
        self.envelopes.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlanStore for InMemoryPlanStore {
    fn save(&self, envelope: &ExecutionEnvelope) -> WaygateResult<()> {
        let mut map = self.envelopes.lock().map_err(|e| {
            WaygateError::new(ErrorCode::StoreIo, format!("store lock poisoned: {}", e))
        })?;
        map.insert(envelope.plan.plan_id.clone(), envelope.clone());
        Ok(())
    }

    fn load(&self, plan_id: &str) -> WaygateResult<Option<ExecutionEnvelope>> {
        let map = self.envelopes.lock().map_err(|e| {
            WaygateError::new(ErrorCode::StoreIo, format!("store lock poisoned: {}", e))
        })?;
        Ok(map.get(plan_id).cloned())
    }
}
