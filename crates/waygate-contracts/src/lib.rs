//! # waygate-contracts
//!
//! Shared types, schemas, and contracts for the Waygate runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, pure predicates on them, and the
//! closed error-code registry.

pub mod authority;
pub mod error;
pub mod plan;
pub mod route;
pub mod step;
pub mod tool;
pub mod work_order;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;

    use super::*;
    use authority::{
        AuthorityScope, Capability, CapabilitySet, DelegationAuthority, ProviderKind,
    };
    use error::{ErrorCode, WaygateError};
    use route::{DecisionOwner, RouteIntent, RouteStatus};
    use step::{AiBuildStep, RouteStep, Step, ToolBuildStep};
    use work_order::WorkOrderId;

    // ── CapabilitySet ────────────────────────────────────────────────────────

    #[test]
    fn capability_set_grant_and_has() {
        let mut caps = CapabilitySet::default();
        let read = Capability::WorkspaceRead;
        let egress = Capability::NetEgress;

        // Nothing granted yet.
        assert!(!caps.has(&read));
        assert!(!caps.has(&egress));

        caps.grant(read);
        assert!(caps.has(&read));
        assert!(!caps.has(&egress));

        caps.grant(egress);
        assert!(caps.has(&read));
        assert!(caps.has(&egress));
    }

    #[test]
    fn capability_set_contains_all_is_subset_check() {
        let wide: CapabilitySet =
            [Capability::WorkspaceRead, Capability::WorkspaceWrite, Capability::NetEgress]
                .into_iter()
                .collect();
        let narrow: CapabilitySet =
            [Capability::WorkspaceRead, Capability::NetEgress].into_iter().collect();

        assert!(wide.contains_all(&narrow));
        assert!(!narrow.contains_all(&wide));
        // Every set contains the empty set.
        assert!(narrow.contains_all(&CapabilitySet::default()));
    }

    #[test]
    fn capability_parse_rejects_unknown_names() {
        assert_eq!(Capability::parse("workspace:read"), Some(Capability::WorkspaceRead));
        assert_eq!(Capability::parse("delegate:spawn"), Some(Capability::DelegateSpawn));
        assert_eq!(Capability::parse("phi:read"), None);
        assert_eq!(Capability::parse(""), None);
    }

    // ── ProviderKind ordering and implied capabilities ───────────────────────

    #[test]
    fn provider_kind_ordinal_ordering() {
        assert!(ProviderKind::Local < ProviderKind::Remote);
        assert!(ProviderKind::Remote < ProviderKind::Delegated);
    }

    #[test]
    fn implied_capabilities_widen_with_kind() {
        let local = ProviderKind::Local.implied_capabilities();
        let remote = ProviderKind::Remote.implied_capabilities();
        let delegated = ProviderKind::Delegated.implied_capabilities();

        assert!(local.has(&Capability::WorkspaceRead));
        assert!(local.has(&Capability::WorkspaceWrite));
        assert!(!local.has(&Capability::NetEgress));

        assert!(remote.has(&Capability::NetEgress));
        assert!(!remote.has(&Capability::DelegateSpawn));

        assert!(delegated.has(&Capability::DelegateSpawn));
        assert!(delegated.contains_all(&remote));
        assert!(remote.contains_all(&local));
    }

    // ── Authority dominance ──────────────────────────────────────────────────

    fn authority(kind: ProviderKind) -> DelegationAuthority {
        DelegationAuthority {
            provider_id: "provider-a".to_string(),
            kind,
            policy_id: "policy-default".to_string(),
            allow_delegation: false,
        }
    }

    #[test]
    fn local_authority_denied_for_remote_requirement() {
        let required = AuthorityScope {
            min_kind: ProviderKind::Remote,
            capabilities: [Capability::NetEgress].into_iter().collect(),
        };

        assert!(!authority(ProviderKind::Local).dominates(&required));
        assert!(authority(ProviderKind::Remote).dominates(&required));
        assert!(authority(ProviderKind::Delegated).dominates(&required));
    }

    #[test]
    fn dominance_requires_implied_capabilities_not_just_kind() {
        // Kind floor is Local, but the capability ask is net egress, which
        // Local never implies.
        let required = AuthorityScope {
            min_kind: ProviderKind::Local,
            capabilities: [Capability::NetEgress].into_iter().collect(),
        };

        assert!(!authority(ProviderKind::Local).dominates(&required));
        assert!(authority(ProviderKind::Remote).dominates(&required));
    }

    // ── ErrorCode registry ───────────────────────────────────────────────────

    #[test]
    fn error_codes_round_trip_through_wire_form() {
        for code in ErrorCode::ALL {
            let parsed = ErrorCode::from_str(code.as_str()).unwrap();
            assert_eq!(parsed, *code, "wire code '{}' must round-trip", code.as_str());
        }
    }

    #[test]
    fn unregistered_error_code_is_rejected() {
        let err = ErrorCode::from_str("route_totally_made_up").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArguments);
    }

    #[test]
    fn error_correlation_id_is_code_and_tick() {
        let err = WaygateError::new(ErrorCode::ToolMissing, "no such tool")
            .with_correlation(17);
        assert_eq!(err.correlation.as_deref(), Some("tool_missing:17"));
    }

    #[test]
    fn error_display_carries_code_and_detail() {
        let err = WaygateError::new(ErrorCode::RouteStateFinal, "run already completed");
        let msg = err.to_string();
        assert!(msg.contains("route_state_final"));
        assert!(msg.contains("run already completed"));
    }

    // ── Step discriminator ───────────────────────────────────────────────────

    fn route_step() -> Step {
        Step::Route(RouteStep {
            id: "step-000-select".to_string(),
            description: "select-tool at node 'select'".to_string(),
            node_id: "select".to_string(),
            intent: RouteIntent::SelectTool,
            owner: DecisionOwner::Ai,
            work_order_id: WorkOrderId::new("wo-1"),
            tool: None,
        })
    }

    #[test]
    fn step_serialization_carries_discriminator() {
        let json = serde_json::to_value(route_step()).unwrap();
        assert_eq!(json["step_kind"], "route");

        let tool = Step::ToolBuild(ToolBuildStep {
            id: "step-001-tool".to_string(),
            description: "run tool".to_string(),
            tool_id: "fmt".to_string(),
            bindings: BTreeMap::new(),
            outputs: vec!["report".to_string()],
        });
        assert_eq!(serde_json::to_value(&tool).unwrap()["step_kind"], "tool-build");

        let ai = Step::AiBuild(AiBuildStep {
            id: "step-002-ai".to_string(),
            description: "prompt".to_string(),
            prompt: "pick a tool".to_string(),
            output_schema: "{}".to_string(),
        });
        assert_eq!(serde_json::to_value(&ai).unwrap()["step_kind"], "ai-build");
    }

    #[test]
    fn step_round_trips_through_json() {
        let original = route_step();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    // ── RouteStatus ──────────────────────────────────────────────────────────

    #[test]
    fn final_statuses_are_exactly_halted_and_completed() {
        assert!(!RouteStatus::Pending.is_final());
        assert!(!RouteStatus::Waiting.is_final());
        assert!(RouteStatus::Halted.is_final());
        assert!(RouteStatus::Completed.is_final());
    }
}
