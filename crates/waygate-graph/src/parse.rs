//! The line-oriented graph parser and the compiled graph value.
//!
//! Grammar: statements are separated by `;` or newlines. A statement is a
//! node declaration (`name` or `name:::kind`) or a chain
//! (`a --> b --> c`). `graph ...` / `flowchart ...` prologue lines are
//! ignored. Node ids strip a shape-delimiter suffix starting at the first
//! of `[`, `(`, `{`, `<`. Kinds are case-insensitive; `gate` is an alias
//! for `route`; the default is `route`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::route::NodeKind;

use crate::hash::{combine_hashes, hash_sorted_tokens};

/// A compiled, validated workflow graph.
///
/// Construction goes through [`parse_graph`], which guarantees the graph
/// is non-empty, has exactly one start node, and carries no conflicting
/// node declarations. Acyclicity is checked by [`FlowGraph::topo_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGraph {
    /// Node id to node kind.
    nodes: BTreeMap<String, NodeKind>,
    /// Edges in first-seen order, deduplicated.
    edges: Vec<(String, String)>,
    /// Successor lists, sorted per node.
    adjacency: BTreeMap<String, Vec<String>>,
    node_set_hash: String,
    edge_set_hash: String,
    structural_hash: String,
}

impl FlowGraph {
    pub fn nodes(&self) -> &BTreeMap<String, NodeKind> {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Sorted successors of `node_id`. Empty for sinks and unknown ids.
    pub fn successors(&self, node_id: &str) -> &[String] {
        self.adjacency
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The kind of `node_id`, if the node exists.
    pub fn node_kind(&self, node_id: &str) -> Option<NodeKind> {
        self.nodes.get(node_id).copied()
    }

    /// The unique start node id.
    pub fn start_node(&self) -> &str {
        // parse_graph enforces exactly one Start node.
        self.nodes
            .iter()
            .find(|(_, kind)| **kind == NodeKind::Start)
            .map(|(id, _)| id.as_str())
            .expect("parse_graph guarantees one start node")
    }

    pub fn node_set_hash(&self) -> &str {
        &self.node_set_hash
    }

    pub fn edge_set_hash(&self) -> &str {
        &self.edge_set_hash
    }

    /// Combined structural hash over node and edge sets.
    pub fn structural_hash(&self) -> &str {
        &self.structural_hash
    }

    /// Canonical topological order: Kahn's algorithm with a sorted-set
    /// frontier, so ties between ready nodes break on lexicographic id.
    ///
    /// Returns `graph_cycle_detected` when nodes remain after the frontier
    /// drains.
    pub fn topo_order(&self) -> WaygateResult<Vec<String>> {
        let mut indegree: BTreeMap<&str, usize> =
            self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for (_, to) in &self.edges {
            if let Some(count) = indegree.get_mut(to.as_str()) {
                *count += 1;
            }
        }

        let mut frontier: BTreeSet<&str> = indegree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = frontier.iter().next().copied() {
            frontier.remove(next);
            order.push(next.to_string());

            for successor in self.successors(next) {
                let count = indegree
                    .get_mut(successor.as_str())
                    .expect("edges only reference declared nodes");
                *count -= 1;
                if *count == 0 {
                    frontier.insert(successor.as_str());
                }
            }
        }

        if order.len() < self.nodes.len() {
            let residual: Vec<&str> = self
                .nodes
                .keys()
                .map(String::as_str)
                .filter(|id| !order.iter().any(|o| o == id))
                .collect();
            return Err(WaygateError::new(
                ErrorCode::GraphCycleDetected,
                format!("cycle through nodes: {}", residual.join(", ")),
            ));
        }

        Ok(order)
    }
}

/// Parse graph text into a compiled [`FlowGraph`].
///
/// Never returns a graph with zero nodes.
pub fn parse_graph(text: &str) -> WaygateResult<FlowGraph> {
    let mut nodes: BTreeMap<String, NodeKind> = BTreeMap::new();
    // Ids declared with an explicit `:::kind` annotation. A second explicit
    // annotation for the same id is a duplicate declaration.
    let mut annotated: BTreeSet<String> = BTreeSet::new();
    let mut edges: Vec<(String, String)> = Vec::new();

    for statement in statements(text) {
        let refs: Vec<&str> = statement.split("-->").map(str::trim).collect();

        let mut previous: Option<String> = None;
        for node_ref in refs {
            if node_ref.is_empty() {
                return Err(WaygateError::new(
                    ErrorCode::InvalidArguments,
                    format!("dangling arrow in statement '{}'", statement),
                ));
            }

            let (id, explicit_kind) = parse_node_ref(node_ref)?;

            match explicit_kind {
                Some(kind) => {
                    if !annotated.insert(id.clone()) {
                        return Err(WaygateError::new(
                            ErrorCode::GraphDuplicateNode,
                            format!("node '{}' is declared more than once", id),
                        ));
                    }
                    nodes.insert(id.clone(), kind);
                }
                None => {
                    nodes.entry(id.clone()).or_insert(NodeKind::Route);
                }
            }

            if let Some(from) = previous.take() {
                let edge = (from, id.clone());
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
            previous = Some(id);
        }
    }

    if nodes.is_empty() {
        return Err(WaygateError::new(
            ErrorCode::GraphEmpty,
            "graph text declares no nodes",
        ));
    }

    let start_count = nodes
        .values()
        .filter(|kind| **kind == NodeKind::Start)
        .count();
    if start_count != 1 {
        return Err(WaygateError::new(
            ErrorCode::GraphStartInvalid,
            format!("graph must declare exactly one start node, found {}", start_count),
        ));
    }

    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (from, to) in &edges {
        adjacency.entry(from.clone()).or_default().push(to.clone());
    }
    for successors in adjacency.values_mut() {
        successors.sort_unstable();
        successors.dedup();
    }

    let node_tokens: Vec<String> = nodes
        .iter()
        .map(|(id, kind)| format!("{}:{}", id, kind.as_str()))
        .collect();
    let edge_tokens: Vec<String> = edges
        .iter()
        .map(|(from, to)| format!("{}->{}", from, to))
        .collect();

    let node_set_hash = hash_sorted_tokens(&node_tokens);
    let edge_set_hash = hash_sorted_tokens(&edge_tokens);
    let structural_hash = combine_hashes(&node_set_hash, &edge_set_hash);

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        structural_hash = %structural_hash,
        "graph compiled"
    );

    Ok(FlowGraph {
        nodes,
        edges,
        adjacency,
        node_set_hash,
        edge_set_hash,
        structural_hash,
    })
}

/// The canonical step ordering for graph text: a pure function of the
/// text. Same text, same order, always.
pub fn order_step_ids(text: &str) -> WaygateResult<Vec<String>> {
    parse_graph(text)?.topo_order()
}

// ── Statement and node-reference parsing ─────────────────────────────────────

/// Split source text into trimmed, non-empty statements, dropping
/// `graph` / `flowchart` prologue lines.
fn statements(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .flat_map(|line| line.split(';'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let lowered = s.to_ascii_lowercase();
            !(lowered == "graph"
                || lowered == "flowchart"
                || lowered.starts_with("graph ")
                || lowered.starts_with("flowchart "))
        })
}

/// Parse one node reference into `(id, explicit kind)`.
///
/// The id is the text before any shape delimiter; the optional kind follows
/// a `:::` marker.
fn parse_node_ref(node_ref: &str) -> WaygateResult<(String, Option<NodeKind>)> {
    let (name_part, kind_part) = match node_ref.split_once(":::") {
        Some((name, kind)) => (name, Some(kind)),
        None => (node_ref, None),
    };

    let id = strip_shape_suffix(name_part).trim().to_string();
    if id.is_empty() {
        return Err(WaygateError::new(
            ErrorCode::InvalidArguments,
            format!("node reference '{}' has no id", node_ref),
        ));
    }

    let kind = match kind_part {
        Some(raw) => Some(parse_kind(raw.trim())?),
        None => None,
    };

    Ok((id, kind))
}

/// Strip a shape-delimiter suffix: everything from the first of
/// `[`, `(`, `{`, `<` onward.
fn strip_shape_suffix(name: &str) -> &str {
    match name.find(['[', '(', '{', '<']) {
        Some(index) => &name[..index],
        None => name,
    }
}

/// Parse a kind annotation, case-insensitive. `gate` and `route` are the
/// same kind.
fn parse_kind(raw: &str) -> WaygateResult<NodeKind> {
    match raw.to_ascii_lowercase().as_str() {
        "start" => Ok(NodeKind::Start),
        "route" | "gate" => Ok(NodeKind::Route),
        "tool" => Ok(NodeKind::Tool),
        "terminal" => Ok(NodeKind::Terminal),
        other => Err(WaygateError::new(
            ErrorCode::GraphKindUnknown,
            format!("unknown node kind annotation '{}'", other),
        )),
    }
}
