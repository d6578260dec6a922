// src/submitter.rs

use ethers::types::{Address, U256};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::AnalyticsRegistry;

/// Raw-data front-end (role: data provider).
///
/// Forwards observational data verbatim to the registry's full-record write
/// operations, using its own identity as the caller credential. Holds no
/// state beyond the registry binding, which is fixed at construction. All
/// authorization is enforced by the registry; if this submitter's identity is
/// not an authorized provider the forwarded call fails with
/// [`RegistryError::Unauthorized`] and the error propagates unchanged.
pub struct DataSubmitter {
    registry: Arc<AnalyticsRegistry>,
    identity: Address,
}

impl DataSubmitter {
    pub fn new(registry: Arc<AnalyticsRegistry>, identity: Address) -> Self {
        Self { registry, identity }
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    pub async fn submit_token_data(
        &self,
        key: Address,
        name: String,
        price: U256,
        volume: U256,
        market_cap: U256,
        holders: u64,
    ) -> Result<(), RegistryError> {
        self.registry
            .submit_token_data(self.identity, key, name, price, volume, market_cap, holders)
            .await
    }

    pub async fn submit_protocol_data(
        &self,
        key: Address,
        name: String,
        tvl: U256,
        unique_users: u64,
    ) -> Result<(), RegistryError> {
        self.registry
            .submit_protocol_data(self.identity, key, name, tvl, unique_users)
            .await
    }
}
