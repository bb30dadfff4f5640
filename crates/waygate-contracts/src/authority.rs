//! Delegation authority and capability types.
//!
//! Waygate bounds tool execution with a two-part authority model: an
//! ordinal provider kind (`Local < Remote < Delegated`) and the capability
//! set each kind implies. Authority is granted once per plan by the
//! delegation policy and never renegotiated mid-execution.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The kind of provider an authority grant or a tool requirement names.
///
/// Ordering is semantic: a higher kind dominates a lower one. `Delegated`
/// is the widest grant and permits spawning sub-executions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ProviderKind {
    Local,
    Remote,
    Delegated,
}

impl ProviderKind {
    /// The capability set implied by this kind.
    ///
    /// Each kind includes everything the kinds below it imply:
    /// Local grants workspace access, Remote adds network egress, and
    /// Delegated adds the right to spawn delegated executions.
    pub fn implied_capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::default();
        set.grant(Capability::WorkspaceRead);
        set.grant(Capability::WorkspaceWrite);
        if *self >= ProviderKind::Remote {
            set.grant(Capability::NetEgress);
        }
        if *self >= ProviderKind::Delegated {
            set.grant(Capability::DelegateSpawn);
        }
        set
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "Local",
            ProviderKind::Remote => "Remote",
            ProviderKind::Delegated => "Delegated",
        }
    }
}

/// A capability flag a tool may require.
///
/// The set is closed. Catalog documents name capabilities by their
/// namespaced wire form; names outside this set are ignored at load time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Capability {
    #[serde(rename = "workspace:read")]
    WorkspaceRead,
    #[serde(rename = "workspace:write")]
    WorkspaceWrite,
    #[serde(rename = "net:egress")]
    NetEgress,
    #[serde(rename = "delegate:spawn")]
    DelegateSpawn,
}

impl Capability {
    /// Parse a namespaced capability name. Returns `None` for names outside
    /// the closed set so catalog loading can skip them.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "workspace:read" => Some(Capability::WorkspaceRead),
            "workspace:write" => Some(Capability::WorkspaceWrite),
            "net:egress" => Some(Capability::NetEgress),
            "delegate:spawn" => Some(Capability::DelegateSpawn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::WorkspaceRead => "workspace:read",
            Capability::WorkspaceWrite => "workspace:write",
            Capability::NetEgress => "net:egress",
            Capability::DelegateSpawn => "delegate:spawn",
        }
    }
}

/// An ordered set of capability flags.
///
/// Backed by a `BTreeSet` so iteration order is deterministic wherever the
/// set contributes to a canonical hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    inner: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Grant a capability. Duplicate grants are idempotent.
    pub fn grant(&mut self, capability: Capability) {
        self.inner.insert(capability);
    }

    /// Return true if the set contains the given capability.
    pub fn has(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }

    /// Return true if every capability in `required` is present here.
    pub fn contains_all(&self, required: &CapabilitySet) -> bool {
        required.inner.is_subset(&self.inner)
    }

    /// Iterate all granted capabilities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// The minimum authority a tool requires to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityScope {
    /// The minimum provider kind.
    pub min_kind: ProviderKind,
    /// Capability flags the tool needs beyond the kind floor.
    pub capabilities: CapabilitySet,
}

/// The authority granted to one plan by the delegation policy.
///
/// Granted exactly once at plan construction. The gate and the executor
/// both validate tool requirements against this grant through
/// [`DelegationAuthority::dominates`], so their verdicts cannot diverge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationAuthority {
    /// Identifier of the provider the grant names.
    pub provider_id: String,
    /// The granted provider kind.
    pub kind: ProviderKind,
    /// Identifier of the policy that issued the grant.
    pub policy_id: String,
    /// Whether the grant permits further delegation.
    pub allow_delegation: bool,
}

impl DelegationAuthority {
    /// Authority dominance predicate.
    ///
    /// True iff the granted kind is at least the required kind AND every
    /// required capability is implied by the granted kind.
    pub fn dominates(&self, required: &AuthorityScope) -> bool {
        self.kind >= required.min_kind
            && self
                .kind
                .implied_capabilities()
                .contains_all(&required.capabilities)
    }
}
