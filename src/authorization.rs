// src/authorization.rs

use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashSet;

/// Which authorization set gates which write path.
///
/// The two observed registry variants are not interchangeable, so the policy
/// is fixed at construction instead of hard-coding one:
///
/// - `SharedProviders`: a single provider set grants full write access to
///   both the submit and the metrics-update paths.
/// - `SeparateAggregators`: the provider set gates submit operations only;
///   metrics updates require membership in a distinct aggregator set.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    SharedProviders,
    SeparateAggregators,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::SharedProviders
    }
}

/// Writer role targeted by a grant or revocation.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WriterRole {
    /// Raw-data submitter (full-record write path).
    Provider,
    /// Metrics aggregator (numeric-fields-only write path).
    Aggregator,
}

impl WriterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterRole::Provider => "provider",
            WriterRole::Aggregator => "aggregator",
        }
    }
}

/// The two membership sets, owned exclusively by the registry.
///
/// Never handed out by reference; all mutation goes through the registry's
/// owner-gated operations.
#[derive(Debug, Default, Clone)]
pub struct WriterSets {
    providers: HashSet<Address>,
    aggregators: HashSet<Address>,
}

impl WriterSets {
    pub fn new(providers: HashSet<Address>, aggregators: HashSet<Address>) -> Self {
        Self {
            providers,
            aggregators,
        }
    }

    /// Adds `identity` to the set `role` maps to under `policy`.
    /// Returns true if membership actually changed (false for the idempotent
    /// re-grant case).
    pub fn grant(&mut self, policy: AccessPolicy, role: WriterRole, identity: Address) -> bool {
        self.target_set(policy, role).insert(identity)
    }

    /// Removes `identity` from the set `role` maps to under `policy`.
    /// Returns true if membership actually changed.
    pub fn revoke(&mut self, policy: AccessPolicy, role: WriterRole, identity: Address) -> bool {
        self.target_set(policy, role).remove(&identity)
    }

    /// Policy predicate for the full-record submit path.
    pub fn may_submit(&self, _policy: AccessPolicy, identity: Address) -> bool {
        self.providers.contains(&identity)
    }

    /// Policy predicate for the metrics-update path.
    pub fn may_update(&self, policy: AccessPolicy, identity: Address) -> bool {
        match policy {
            AccessPolicy::SharedProviders => self.providers.contains(&identity),
            AccessPolicy::SeparateAggregators => self.aggregators.contains(&identity),
        }
    }

    /// True if the identity holds any writer role.
    pub fn is_member(&self, identity: Address) -> bool {
        self.providers.contains(&identity) || self.aggregators.contains(&identity)
    }

    pub fn is_member_for(&self, policy: AccessPolicy, role: WriterRole, identity: Address) -> bool {
        match role {
            WriterRole::Provider => self.may_submit(policy, identity),
            WriterRole::Aggregator => self.may_update(policy, identity),
        }
    }

    pub fn providers(&self) -> &HashSet<Address> {
        &self.providers
    }

    pub fn aggregators(&self) -> &HashSet<Address> {
        &self.aggregators
    }

    // Under SharedProviders both roles collapse onto the provider set; the
    // aggregator set is only populated by the SeparateAggregators policy.
    fn target_set(&mut self, policy: AccessPolicy, role: WriterRole) -> &mut HashSet<Address> {
        match (policy, role) {
            (AccessPolicy::SharedProviders, _) => &mut self.providers,
            (AccessPolicy::SeparateAggregators, WriterRole::Provider) => &mut self.providers,
            (AccessPolicy::SeparateAggregators, WriterRole::Aggregator) => &mut self.aggregators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_policy_collapses_roles() {
        let mut sets = WriterSets::default();
        let id = Address::random();

        assert!(sets.grant(AccessPolicy::SharedProviders, WriterRole::Aggregator, id));
        assert!(sets.may_submit(AccessPolicy::SharedProviders, id));
        assert!(sets.may_update(AccessPolicy::SharedProviders, id));
        assert!(sets.aggregators().is_empty());
    }

    #[test]
    fn test_separate_policy_keeps_sets_distinct() {
        let mut sets = WriterSets::default();
        let provider = Address::random();
        let aggregator = Address::random();

        sets.grant(
            AccessPolicy::SeparateAggregators,
            WriterRole::Provider,
            provider,
        );
        sets.grant(
            AccessPolicy::SeparateAggregators,
            WriterRole::Aggregator,
            aggregator,
        );

        assert!(sets.may_submit(AccessPolicy::SeparateAggregators, provider));
        assert!(!sets.may_update(AccessPolicy::SeparateAggregators, provider));
        assert!(sets.may_update(AccessPolicy::SeparateAggregators, aggregator));
        assert!(!sets.may_submit(AccessPolicy::SeparateAggregators, aggregator));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut sets = WriterSets::default();
        let id = Address::random();

        assert!(sets.grant(AccessPolicy::SharedProviders, WriterRole::Provider, id));
        assert!(!sets.grant(AccessPolicy::SharedProviders, WriterRole::Provider, id));
        assert_eq!(sets.providers().len(), 1);

        assert!(sets.revoke(AccessPolicy::SharedProviders, WriterRole::Provider, id));
        assert!(!sets.revoke(AccessPolicy::SharedProviders, WriterRole::Provider, id));
    }
}
