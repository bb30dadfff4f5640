//! # waygate-plan
//!
//! The deterministic plan builder for the Waygate runtime.
//!
//! Combines a build request (work order, command id, args, route rules)
//! with a compiled graph into an ordered, typed step list, asks the
//! pluggable delegation policy for the plan's one authority grant, and
//! seals the result under a canonical SHA-256 identity. No wall-clock,
//! machine, or random state may enter the hash; absolute filesystem paths
//! in any hashed field fail plan construction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waygate_graph::parse_graph;
//! use waygate_plan::{build_plan, initial_state, policy::TomlDelegationPolicy};
//!
//! let graph = parse_graph(graph_text)?;
//! let policy = TomlDelegationPolicy::from_toml_str(grants_toml)?;
//! let plan = build_plan(&request, &graph, &policy)?;
//! let state = initial_state(&plan)?;
//! ```

pub mod builder;
pub mod hash;
pub mod normalize;
pub mod policy;
pub mod render;

pub use builder::{build_plan, initial_state, TOOL_SELECTION_SCHEMA};
pub use hash::{intent_token, plan_identity, PlanHasher};
pub use normalize::{normalize_request, BuildRequest};
pub use policy::{DelegationPolicy, StaticDelegationPolicy, TomlDelegationPolicy};
pub use render::{from_json, render_text, to_json};
