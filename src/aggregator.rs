// src/aggregator.rs

use ethers::types::{Address, U256};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::AnalyticsRegistry;

/// Pre-aggregated-metrics front-end (role: aggregator).
///
/// Symmetric to [`DataSubmitter`](crate::submitter::DataSubmitter) but
/// forwards through the numeric-fields-only update operations. Under the
/// `SeparateAggregators` policy this identity must be granted the aggregator
/// role rather than the provider role; under `SharedProviders` the single
/// provider set covers both. Failures propagate unchanged, with no retry and
/// no swallowing.
pub struct MetricsAggregator {
    registry: Arc<AnalyticsRegistry>,
    identity: Address,
}

impl MetricsAggregator {
    pub fn new(registry: Arc<AnalyticsRegistry>, identity: Address) -> Self {
        Self { registry, identity }
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub async fn update_token_metrics(
        &self,
        key: Address,
        price: U256,
        volume: U256,
        market_cap: U256,
        holders: u64,
    ) -> Result<(), RegistryError> {
        self.registry
            .update_token_metrics(self.identity, key, price, volume, market_cap, holders)
            .await
    }

    pub async fn update_protocol_metrics(
        &self,
        key: Address,
        tvl: U256,
        volume24h: U256,
        unique_users: u64,
    ) -> Result<(), RegistryError> {
        self.registry
            .update_protocol_metrics(self.identity, key, tvl, volume24h, unique_users)
            .await
    }
}
