//! Integration tests for the submitter and aggregator front-ends
//!
//! Tests cover:
//! - End-to-end grant / submit / read / revoke flow through DataSubmitter
//! - MetricsAggregator under the separate-aggregators policy
//! - Unmodified error propagation through the front-ends
//! - Event delivery with strictly increasing sequences

use analytics_registry::{
    AccessPolicy, AnalyticsRegistry, DataSubmitter, MetricsAggregator, RegistryError, WriterRole,
};
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Full provider lifecycle driven through the submitter front-end
#[tokio::test]
async fn test_submitter_lifecycle() {
    let owner = Address::random();
    let registry = Arc::new(AnalyticsRegistry::new(
        owner,
        AccessPolicy::SharedProviders,
        64,
    ));
    let submitter = DataSubmitter::new(registry.clone(), Address::random());
    let key = Address::random();

    // Before any grant the forwarded call is rejected
    let err = submitter
        .submit_token_data(
            key,
            "Test".into(),
            U256::from(100),
            U256::from(1_000_000),
            U256::from(10_000_000),
            1000,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::Unauthorized {
            caller: submitter.identity()
        }
    );

    registry
        .add_writer(owner, submitter.identity(), WriterRole::Provider)
        .await
        .unwrap();

    submitter
        .submit_token_data(
            key,
            "Test".into(),
            U256::from(100),
            U256::from(1_000_000),
            U256::from(10_000_000),
            1000,
        )
        .await
        .unwrap();
    submitter
        .submit_protocol_data(key, "Proto".into(), U256::from(42), 7)
        .await
        .unwrap();

    let record = registry.get_token(key).await;
    assert_eq!(record.name, "Test");
    assert_eq!(record.price, U256::from(100));
    assert_eq!(record.volume, U256::from(1_000_000));
    assert_eq!(record.market_cap, U256::from(10_000_000));
    assert_eq!(record.holders, 1000);

    // Revocation cuts the submitter off immediately
    registry
        .remove_writer(owner, submitter.identity(), WriterRole::Provider)
        .await
        .unwrap();
    let err = submitter
        .submit_token_data(
            key,
            "Test".into(),
            U256::from(200),
            U256::from(2),
            U256::from(3),
            4,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::Unauthorized {
            caller: submitter.identity()
        }
    );
    assert_eq!(registry.get_token(key).await.price, U256::from(100));
}

/// Aggregator front-end against the separate-aggregators policy
#[tokio::test]
async fn test_aggregator_requires_aggregator_role() {
    let owner = Address::random();
    let registry = Arc::new(AnalyticsRegistry::new(
        owner,
        AccessPolicy::SeparateAggregators,
        64,
    ));
    let aggregator = MetricsAggregator::new(registry.clone(), Address::random());
    let key = Address::random();

    // A provider grant is not enough under this policy
    registry
        .add_writer(owner, aggregator.identity(), WriterRole::Provider)
        .await
        .unwrap();
    let err = aggregator
        .update_token_metrics(key, U256::from(1), U256::from(2), U256::from(3), 4)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::Unauthorized {
            caller: aggregator.identity()
        }
    );

    registry
        .add_writer(owner, aggregator.identity(), WriterRole::Aggregator)
        .await
        .unwrap();
    aggregator
        .update_token_metrics(key, U256::from(1), U256::from(2), U256::from(3), 4)
        .await
        .unwrap();
    aggregator
        .update_protocol_metrics(key, U256::from(10), U256::from(20), 30)
        .await
        .unwrap();

    assert_eq!(registry.get_token(key).await.price, U256::from(1));
    assert_eq!(registry.get_protocol(key).await.volume24h, U256::from(20));
}

/// Every applied mutation reaches subscribers in order with growing sequences
#[tokio::test]
async fn test_event_delivery_through_frontends() {
    let owner = Address::random();
    let registry = Arc::new(AnalyticsRegistry::new(
        owner,
        AccessPolicy::SharedProviders,
        64,
    ));
    let mut rx = registry.subscribe();

    let submitter = DataSubmitter::new(registry.clone(), Address::random());
    registry
        .add_writer(owner, submitter.identity(), WriterRole::Provider)
        .await
        .unwrap();
    submitter
        .submit_token_data(
            Address::random(),
            "A".into(),
            U256::from(1),
            U256::from(1),
            U256::from(1),
            1,
        )
        .await
        .unwrap();
    submitter
        .submit_protocol_data(Address::random(), "P".into(), U256::from(1), 1)
        .await
        .unwrap();

    // Rejected calls publish nothing
    let intruder = DataSubmitter::new(registry.clone(), Address::random());
    intruder
        .submit_protocol_data(Address::random(), "X".into(), U256::from(1), 1)
        .await
        .unwrap_err();

    registry
        .remove_writer(owner, submitter.identity(), WriterRole::Provider)
        .await
        .unwrap();

    // grant, token, protocol, revoke: exactly four events, ordered
    let mut last = 0;
    for _ in 0..4 {
        let event = rx.recv().await.unwrap();
        assert!(event.sequence() > last, "sequences must strictly increase");
        last = event.sequence();
    }
    assert!(rx.try_recv().is_err(), "no event for the rejected write");
}
