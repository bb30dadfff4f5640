//! The pluggable delegation policy.
//!
//! The plan builder asks a `DelegationPolicy` for exactly one authority
//! grant per plan. Policies must be pure: same normalized request, same
//! authority, every time. `TomlDelegationPolicy` reads an ordered grant
//! table from TOML; the first rule whose command pattern matches wins, and
//! an unmatched request is rejected rather than granted a default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use waygate_contracts::authority::{DelegationAuthority, ProviderKind};
use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::plan::NormalizedRequest;
use waygate_contracts::step::Step;

/// Grants plan authority from a normalized request and the provisional
/// step list derived from it.
///
/// Implementations are trusted and must be deterministic; no I/O or clock
/// reads during `grant`.
pub trait DelegationPolicy {
    fn grant(
        &self,
        request: &NormalizedRequest,
        provisional_steps: &[Step],
    ) -> WaygateResult<DelegationAuthority>;
}

/// A policy that grants one fixed authority to every request.
///
/// Intended for tests and embedders that decide authority out of band.
#[derive(Debug, Clone)]
pub struct StaticDelegationPolicy {
    authority: DelegationAuthority,
}

impl StaticDelegationPolicy {
    pub fn new(authority: DelegationAuthority) -> Self {
        Self { authority }
    }
}

impl DelegationPolicy for StaticDelegationPolicy {
    fn grant(
        &self,
        _request: &NormalizedRequest,
        _provisional_steps: &[Step],
    ) -> WaygateResult<DelegationAuthority> {
        Ok(self.authority.clone())
    }
}

// ── TOML-driven policy ───────────────────────────────────────────────────────

/// One grant rule loaded from TOML.
///
/// `command` supports the special wildcard value `"*"`, which matches any
/// command id; otherwise matching is exact and case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantRule {
    /// Stable identifier; becomes the `policy_id` of the issued authority.
    pub id: String,
    /// Human-readable explanation of what this grant covers.
    pub description: String,
    /// Command pattern to match against the normalized command id.
    pub command: String,
    /// Provider the grant names.
    pub provider_id: String,
    /// Granted provider kind.
    pub provider_kind: ProviderKind,
    /// Whether further delegation is permitted.
    #[serde(default)]
    pub allow_delegation: bool,
}

impl GrantRule {
    fn matches(&self, command_id: &str) -> bool {
        self.command == "*" || self.command == command_id
    }
}

/// The top-level structure deserialized from a TOML grants file.
///
/// Rules are evaluated in declaration order; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantConfig {
    pub grants: Vec<GrantRule>,
}

/// A `DelegationPolicy` that reads its grant table from a TOML document.
///
/// ```rust,ignore
/// use waygate_plan::policy::TomlDelegationPolicy;
///
/// let policy = TomlDelegationPolicy::from_file(Path::new("grants/build.toml"))?;
/// ```
#[derive(Debug)]
pub struct TomlDelegationPolicy {
    config: GrantConfig,
}

impl TomlDelegationPolicy {
    /// Parse `s` as TOML and build a policy.
    ///
    /// Returns `invalid_arguments` if the TOML is malformed or does not
    /// match the `GrantConfig` schema.
    pub fn from_toml_str(s: &str) -> WaygateResult<Self> {
        let config: GrantConfig = toml::from_str(s).map_err(|e| {
            WaygateError::new(
                ErrorCode::InvalidArguments,
                format!("failed to parse grants TOML: {}", e),
            )
        })?;
        Ok(Self { config })
    }

    /// Read the file at `path` and parse it as a TOML grant table.
    pub fn from_file(path: &Path) -> WaygateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WaygateError::new(
                ErrorCode::InvalidArguments,
                format!("failed to read grants file '{}': {}", path.display(), e),
            )
        })?;
        Self::from_toml_str(&contents)
    }
}

impl DelegationPolicy for TomlDelegationPolicy {
    /// Evaluate the grant table against the normalized command id.
    ///
    /// Rules are tested in declaration order; the first match issues the
    /// authority. No match means `policy_rejected`: authority is granted
    /// explicitly or not at all. The provisional steps are available to
    /// richer policies; the grant table does not consult them.
    fn grant(
        &self,
        request: &NormalizedRequest,
        _provisional_steps: &[Step],
    ) -> WaygateResult<DelegationAuthority> {
        for rule in &self.config.grants {
            if !rule.matches(&request.command_id) {
                continue;
            }

            debug!(
                rule_id = %rule.id,
                command = %request.command_id,
                kind = rule.provider_kind.as_str(),
                "grant rule matched"
            );

            return Ok(DelegationAuthority {
                provider_id: rule.provider_id.clone(),
                kind: rule.provider_kind,
                policy_id: rule.id.clone(),
                allow_delegation: rule.allow_delegation,
            });
        }

        warn!(
            command = %request.command_id,
            "no grant rule matched; rejecting"
        );

        Err(WaygateError::new(
            ErrorCode::PolicyRejected,
            format!(
                "no grant rule matched command '{}'",
                request.command_id
            ),
        ))
    }
}
