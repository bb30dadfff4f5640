//! Tool specification types.
//!
//! A `ToolSpec` is the registry's view of one tool: identity, required
//! authority scope, and the ordered input/output declarations the gate
//! checks bindings against. Catalog parsing lives in waygate-registry;
//! these are the validated in-memory forms.

use serde::{Deserialize, Serialize};

use crate::authority::AuthorityScope;

/// One declared tool input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInputSpec {
    pub name: String,
    /// Free-form type label ("string", "path", ...). Not interpreted by the
    /// core; surfaced to deciders and renderers.
    pub value_type: String,
    /// Required inputs must be bound before the tool may run.
    pub required: bool,
    pub description: String,
}

/// One declared tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutputSpec {
    pub name: String,
    pub value_type: String,
    pub description: String,
}

/// A registry entry for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub tool_id: String,
    pub description: String,
    /// Minimum authority required to run this tool.
    pub authority: AuthorityScope,
    /// Ordered input declarations.
    pub inputs: Vec<ToolInputSpec>,
    /// Ordered output declarations.
    pub outputs: Vec<ToolOutputSpec>,
}

impl ToolSpec {
    /// Names of all inputs marked required, in declaration order.
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|input| input.required)
            .map(|input| input.name.as_str())
    }

    /// True if `name` is a declared input of this tool.
    pub fn declares_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|input| input.name == name)
    }
}
