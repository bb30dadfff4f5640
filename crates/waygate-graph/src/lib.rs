//! # waygate-graph
//!
//! The graph compiler for the Waygate runtime.
//!
//! Turns the line-oriented graph notation (`a --> b --> c`, with optional
//! `:::kind` annotations) into a validated node set, edge set, adjacency
//! map, and three canonical hashes. The topological order uses Kahn's
//! algorithm with a sorted-set frontier so any acyclic graph resolves to
//! exactly one order regardless of how its statements were written.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waygate_graph::{parse_graph, order_step_ids};
//!
//! let graph = parse_graph("select:::start --> terminate:::terminal")?;
//! let order = graph.topo_order()?;
//! assert_eq!(order, vec!["select", "terminate"]);
//! ```

pub mod hash;
pub mod parse;

pub use hash::hash_sorted_tokens;
pub use parse::{order_step_ids, parse_graph, FlowGraph};
