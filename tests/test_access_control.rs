//! Integration tests for registry access control
//!
//! Tests cover:
//! - Owner-only writer management
//! - Grant / revoke idempotence
//! - Immediate revocation
//! - Policy-dependent gating of the two write paths

use analytics_registry::{
    AccessPolicy, AnalyticsRegistry, ProtocolRecord, RegistryError, TokenRecord, WriterRole,
};
use ethers::types::{Address, U256};

fn new_registry(policy: AccessPolicy) -> (AnalyticsRegistry, Address) {
    let owner = Address::random();
    (AnalyticsRegistry::new(owner, policy, 64), owner)
}

/// Unauthorized writes fail and leave stored data untouched
#[tokio::test]
async fn test_unauthorized_write_is_rejected_without_side_effects() {
    let (registry, _owner) = new_registry(AccessPolicy::SharedProviders);
    let stranger = Address::random();
    let key = Address::random();

    let err = registry
        .submit_token_data(
            stranger,
            key,
            "Rogue".into(),
            U256::from(1),
            U256::from(2),
            U256::from(3),
            4,
        )
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { caller: stranger });

    let err = registry
        .update_protocol_metrics(stranger, key, U256::from(1), U256::from(2), 3)
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { caller: stranger });

    // No record was created by the rejected writes
    assert_eq!(registry.get_token(key).await, TokenRecord::default());
    assert_eq!(registry.get_protocol(key).await, ProtocolRecord::default());
    assert_eq!(registry.token_count().await, 0);
    assert_eq!(registry.protocol_count().await, 0);
}

/// Only the owner can grant or revoke, even an authorized writer cannot
#[tokio::test]
async fn test_writer_management_is_owner_only() {
    let (registry, owner) = new_registry(AccessPolicy::SharedProviders);
    let writer = Address::random();
    let other = Address::random();

    registry
        .add_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();

    // An authorized writer still cannot manage the writer set
    let err = registry
        .add_writer(writer, other, WriterRole::Provider)
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::OwnerOnly { caller: writer });
    assert!(!registry.is_authorized(other).await);

    let err = registry
        .remove_writer(writer, writer, WriterRole::Provider)
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::OwnerOnly { caller: writer });
    assert!(registry.is_authorized(writer).await);
}

/// Granting an existing writer or revoking a non-writer is a silent success
#[tokio::test]
async fn test_grant_and_revoke_are_idempotent() {
    let (registry, owner) = new_registry(AccessPolicy::SharedProviders);
    let writer = Address::random();

    registry
        .add_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();
    registry
        .add_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();
    assert!(registry.is_authorized(writer).await);

    registry
        .remove_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();
    registry
        .remove_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();
    assert!(!registry.is_authorized(writer).await);

    // Revoking an identity that was never granted is also fine
    registry
        .remove_writer(owner, Address::random(), WriterRole::Provider)
        .await
        .unwrap();
}

/// Revocation takes effect for the very next call
#[tokio::test]
async fn test_revocation_is_immediate() {
    let (registry, owner) = new_registry(AccessPolicy::SharedProviders);
    let writer = Address::random();
    let key = Address::random();

    registry
        .add_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();
    registry
        .submit_token_data(
            writer,
            key,
            "TKN".into(),
            U256::from(100),
            U256::from(1000),
            U256::from(10000),
            42,
        )
        .await
        .unwrap();

    registry
        .remove_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();

    let err = registry
        .submit_token_data(
            writer,
            key,
            "TKN".into(),
            U256::from(200),
            U256::from(2000),
            U256::from(20000),
            43,
        )
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { caller: writer });

    // The record from before revocation survives unchanged
    let record = registry.get_token(key).await;
    assert_eq!(record.price, U256::from(100));
    assert_eq!(record.holders, 42);
}

/// Under the shared policy one provider grant covers both write paths
#[tokio::test]
async fn test_shared_policy_grants_both_paths() {
    let (registry, owner) = new_registry(AccessPolicy::SharedProviders);
    let writer = Address::random();
    let key = Address::random();

    registry
        .add_writer(owner, writer, WriterRole::Provider)
        .await
        .unwrap();

    registry
        .submit_protocol_data(writer, key, "Proto".into(), U256::from(10), 5)
        .await
        .unwrap();
    registry
        .update_protocol_metrics(writer, key, U256::from(20), U256::from(7), 6)
        .await
        .unwrap();

    assert!(registry.is_authorized_for(writer, WriterRole::Provider).await);
    assert!(registry.is_authorized_for(writer, WriterRole::Aggregator).await);
}

/// Under the separate policy the provider set does not gate metrics updates
#[tokio::test]
async fn test_separate_policy_keeps_paths_distinct() {
    let (registry, owner) = new_registry(AccessPolicy::SeparateAggregators);
    let provider = Address::random();
    let aggregator = Address::random();
    let key = Address::random();

    registry
        .add_writer(owner, provider, WriterRole::Provider)
        .await
        .unwrap();
    registry
        .add_writer(owner, aggregator, WriterRole::Aggregator)
        .await
        .unwrap();

    // Provider can submit but not update
    registry
        .submit_protocol_data(provider, key, "Proto".into(), U256::from(10), 5)
        .await
        .unwrap();
    let err = registry
        .update_protocol_metrics(provider, key, U256::from(20), U256::from(7), 6)
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { caller: provider });

    // Aggregator can update but not submit
    registry
        .update_protocol_metrics(aggregator, key, U256::from(20), U256::from(7), 6)
        .await
        .unwrap();
    let err = registry
        .submit_protocol_data(aggregator, key, "Proto".into(), U256::from(10), 5)
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::Unauthorized { caller: aggregator });
}
