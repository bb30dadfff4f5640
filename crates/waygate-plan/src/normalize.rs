//! Build request normalization.
//!
//! Normalization is the single place argument ordering is decided: args
//! keys are lowercased and sorted, route rules are sorted by node id, and
//! the command id is trimmed. The caller's original maps are read, never
//! mutated, so the same request value can be normalized any number of
//! times with the same result.

use std::collections::{BTreeMap, HashMap};

use waygate_contracts::plan::NormalizedRequest;
use waygate_contracts::route::RouteRule;
use waygate_contracts::work_order::WorkOrder;

/// A raw build request as supplied by the embedder.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Command identifier; surrounding whitespace is insignificant.
    pub command_id: String,
    pub work_order: WorkOrder,
    /// Free-form arguments. Key case is insignificant.
    pub args: HashMap<String, String>,
    /// Route rules, in any order.
    pub rules: Vec<RouteRule>,
}

/// Produce the canonical form of a build request.
pub fn normalize_request(request: &BuildRequest) -> NormalizedRequest {
    // Sort pairs before inserting so a case-folding collision resolves the
    // same way regardless of the source map's iteration order.
    let mut pairs: Vec<(String, String)> = request
        .args
        .iter()
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.clone()))
        .collect();
    pairs.sort();

    let mut args = BTreeMap::new();
    for (key, value) in pairs {
        args.insert(key, value);
    }

    let mut rules: Vec<RouteRule> = request.rules.clone();
    rules.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    NormalizedRequest {
        command_id: request.command_id.trim().to_string(),
        work_order: request.work_order.clone(),
        args,
        rules,
    }
}
