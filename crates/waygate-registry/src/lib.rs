//! # waygate-registry
//!
//! Tool catalog loading and authority validation for the Waygate runtime.
//!
//! A catalog document (JSON, camelCase) is validated against an embedded
//! JSON Schema, converted into `ToolSpec` entries, and sealed under a
//! canonical hash that ignores document order. The validation half is the
//! shared authority check the gate uses pre-flight and the loop uses per
//! invocation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waygate_registry::{load_catalog, validate_plan_authority};
//!
//! let snapshot = load_catalog(catalog_json)?;
//! validate_plan_authority(&plan, &snapshot)?;
//! ```

pub mod catalog;
pub mod validate;

pub use catalog::{load_catalog, ToolRegistrySnapshot};
pub use validate::{validate_invocation, validate_plan_authority};
