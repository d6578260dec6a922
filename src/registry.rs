// src/registry.rs

use ethers::types::{Address, U256};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::authorization::{AccessPolicy, WriterRole, WriterSets};
use crate::error::RegistryError;
use crate::event_stream::{RegistryEvent, RegistryEventStream};
use crate::metrics;
use crate::records::{ProtocolRecord, TokenRecord};

/// Access-control-gated storage for token and protocol statistics.
///
/// The registry is the single source of truth: it owns the record maps, the
/// owner identity, and the writer sets, and no other component touches the
/// underlying storage directly. Mutations are guarded by the configured
/// [`AccessPolicy`]; reads are open to anyone and never fail.
///
/// ## Concurrency
///
/// One `RwLock` wraps the whole state. Each mutation holds the write lock for
/// the full check-then-apply step, so mutations are strictly sequenced and a
/// failed authorization check leaves state byte-for-byte unchanged. Reads
/// take the read lock and proceed concurrently.
///
/// Events are published while the write lock is still held (`broadcast::send`
/// is synchronous and never blocks), so subscribers receive them in exactly
/// the order the mutations applied.
pub struct AnalyticsRegistry {
    owner: Address,
    policy: AccessPolicy,
    state: RwLock<RegistryState>,
    events: RegistryEventStream,
}

#[derive(Debug, Default)]
struct RegistryState {
    tokens: HashMap<Address, TokenRecord>,
    protocols: HashMap<Address, ProtocolRecord>,
    writers: WriterSets,
    next_sequence: u64,
}

impl RegistryState {
    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

impl AnalyticsRegistry {
    /// Creates an empty registry owned by `owner`.
    pub fn new(owner: Address, policy: AccessPolicy, event_capacity: usize) -> Self {
        info!(
            "AnalyticsRegistry created (owner: {:?}, policy: {:?})",
            owner, policy
        );
        Self {
            owner,
            policy,
            state: RwLock::new(RegistryState::default()),
            events: RegistryEventStream::new(event_capacity),
        }
    }

    /// Reconstructs a registry from previously persisted state.
    pub fn restore(
        owner: Address,
        policy: AccessPolicy,
        event_capacity: usize,
        tokens: HashMap<Address, TokenRecord>,
        protocols: HashMap<Address, ProtocolRecord>,
        providers: HashSet<Address>,
        aggregators: HashSet<Address>,
    ) -> Self {
        info!(
            "AnalyticsRegistry restored ({} tokens, {} protocols, {} providers, {} aggregators)",
            tokens.len(),
            protocols.len(),
            providers.len(),
            aggregators.len()
        );
        metrics::set_token_record_count(tokens.len() as f64);
        metrics::set_protocol_record_count(protocols.len() as f64);
        Self {
            owner,
            policy,
            state: RwLock::new(RegistryState {
                tokens,
                protocols,
                writers: WriterSets::new(providers, aggregators),
                next_sequence: 0,
            }),
            events: RegistryEventStream::new(event_capacity),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Subscribes to change notifications for all registry mutations.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub fn event_subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    // --- Authorization management (owner-gated) ---

    /// Grants `identity` the writer role. Owner-only; idempotent (re-granting
    /// an existing member is a silent success and publishes no event).
    pub async fn add_writer(
        &self,
        caller: Address,
        identity: Address,
        role: WriterRole,
    ) -> Result<(), RegistryError> {
        self.require_owner(caller)?;
        let mut state = self.state.write().await;
        if state.writers.grant(self.policy, role, identity) {
            let sequence = state.next_sequence();
            self.events.publish(RegistryEvent::WriterAuthorized {
                identity,
                role,
                sequence,
            });
            drop(state);
            info!("writer {:?} authorized as {}", identity, role.as_str());
            metrics::increment_writer_grant(role.as_str());
        }
        Ok(())
    }

    /// Revokes `identity`'s writer role. Owner-only; idempotent; takes effect
    /// for the very next call, with no grace period.
    pub async fn remove_writer(
        &self,
        caller: Address,
        identity: Address,
        role: WriterRole,
    ) -> Result<(), RegistryError> {
        self.require_owner(caller)?;
        let mut state = self.state.write().await;
        if state.writers.revoke(self.policy, role, identity) {
            let sequence = state.next_sequence();
            self.events.publish(RegistryEvent::WriterRevoked {
                identity,
                role,
                sequence,
            });
            drop(state);
            info!("writer {:?} revoked from {}", identity, role.as_str());
            metrics::increment_writer_revocation(role.as_str());
        }
        Ok(())
    }

    /// True if `identity` holds any writer role.
    pub async fn is_authorized(&self, identity: Address) -> bool {
        self.state.read().await.writers.is_member(identity)
    }

    /// True if `identity` may use the write path `role` maps to under the
    /// configured policy.
    pub async fn is_authorized_for(&self, identity: Address, role: WriterRole) -> bool {
        self.state
            .read()
            .await
            .writers
            .is_member_for(self.policy, role, identity)
    }

    // --- Record mutations (policy-gated) ---

    /// Full overwrite of the token record at `key`: every field is replaced,
    /// including fields passed as zero. No merge with the previous record.
    pub async fn submit_token_data(
        &self,
        caller: Address,
        key: Address,
        name: String,
        price: U256,
        volume: U256,
        market_cap: U256,
        holders: u64,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        self.require_submit(&state, caller)?;
        state.tokens.insert(
            key,
            TokenRecord {
                name,
                price,
                volume,
                market_cap,
                holders,
            },
        );
        let sequence = state.next_sequence();
        let count = state.tokens.len();
        self.events
            .publish(RegistryEvent::TokenUpdated { key, sequence });
        drop(state);

        debug!("token {:?} submitted by {:?}", key, caller);
        metrics::increment_record_write("token", "submit");
        metrics::set_token_record_count(count as f64);
        Ok(())
    }

    /// Numeric-fields-only overwrite of the token record at `key`. `name` is
    /// preserved when the record exists; for a new record it stays at its
    /// zero value until a full submit provides one.
    pub async fn update_token_metrics(
        &self,
        caller: Address,
        key: Address,
        price: U256,
        volume: U256,
        market_cap: U256,
        holders: u64,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        self.require_update(&state, caller)?;
        let record = state.tokens.entry(key).or_default();
        record.price = price;
        record.volume = volume;
        record.market_cap = market_cap;
        record.holders = holders;
        let sequence = state.next_sequence();
        let count = state.tokens.len();
        self.events
            .publish(RegistryEvent::TokenUpdated { key, sequence });
        drop(state);

        debug!("token {:?} metrics updated by {:?}", key, caller);
        metrics::increment_record_write("token", "update");
        metrics::set_token_record_count(count as f64);
        Ok(())
    }

    /// Full-record protocol write. Sets name, TVL and user count; `volume24h`
    /// belongs to the metrics-update path and is never touched here.
    pub async fn submit_protocol_data(
        &self,
        caller: Address,
        key: Address,
        name: String,
        tvl: U256,
        unique_users: u64,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        self.require_submit(&state, caller)?;
        let record = state.protocols.entry(key).or_default();
        record.name = name;
        record.tvl = tvl;
        record.unique_users = unique_users;
        let sequence = state.next_sequence();
        let count = state.protocols.len();
        self.events
            .publish(RegistryEvent::ProtocolUpdated { key, sequence });
        drop(state);

        debug!("protocol {:?} submitted by {:?}", key, caller);
        metrics::increment_record_write("protocol", "submit");
        metrics::set_protocol_record_count(count as f64);
        Ok(())
    }

    /// Numeric-fields-only protocol write; additionally the only operation
    /// that sets `volume24h`. `name` is preserved.
    pub async fn update_protocol_metrics(
        &self,
        caller: Address,
        key: Address,
        tvl: U256,
        volume24h: U256,
        unique_users: u64,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        self.require_update(&state, caller)?;
        let record = state.protocols.entry(key).or_default();
        record.tvl = tvl;
        record.volume24h = volume24h;
        record.unique_users = unique_users;
        let sequence = state.next_sequence();
        let count = state.protocols.len();
        self.events
            .publish(RegistryEvent::ProtocolUpdated { key, sequence });
        drop(state);

        debug!("protocol {:?} metrics updated by {:?}", key, caller);
        metrics::increment_record_write("protocol", "update");
        metrics::set_protocol_record_count(count as f64);
        Ok(())
    }

    // --- Reads (unguarded) ---

    /// Returns the token record at `key`, or the zero-value record if no
    /// write has occurred for that key.
    pub async fn get_token(&self, key: Address) -> TokenRecord {
        self.state
            .read()
            .await
            .tokens
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the protocol record at `key`, or the zero-value record.
    pub async fn get_protocol(&self, key: Address) -> ProtocolRecord {
        self.state
            .read()
            .await
            .protocols
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }

    pub async fn protocol_count(&self) -> usize {
        self.state.read().await.protocols.len()
    }

    /// All token keys with a stored record.
    pub async fn token_keys(&self) -> Vec<Address> {
        self.state.read().await.tokens.keys().copied().collect()
    }

    /// All protocol keys with a stored record.
    pub async fn protocol_keys(&self) -> Vec<Address> {
        self.state.read().await.protocols.keys().copied().collect()
    }

    /// Snapshot of the current (providers, aggregators) membership sets.
    pub async fn writer_snapshot(&self) -> (HashSet<Address>, HashSet<Address>) {
        let state = self.state.read().await;
        (
            state.writers.providers().clone(),
            state.writers.aggregators().clone(),
        )
    }

    // --- Gate predicates ---

    fn require_owner(&self, caller: Address) -> Result<(), RegistryError> {
        if caller != self.owner {
            metrics::increment_write_rejected("owner_only");
            return Err(RegistryError::OwnerOnly { caller });
        }
        Ok(())
    }

    fn require_submit(&self, state: &RegistryState, caller: Address) -> Result<(), RegistryError> {
        if !state.writers.may_submit(self.policy, caller) {
            metrics::increment_write_rejected("unauthorized");
            return Err(RegistryError::Unauthorized { caller });
        }
        Ok(())
    }

    fn require_update(&self, state: &RegistryState, caller: Address) -> Result<(), RegistryError> {
        if !state.writers.may_update(self.policy, caller) {
            metrics::increment_write_rejected("unauthorized");
            return Err(RegistryError::Unauthorized { caller });
        }
        Ok(())
    }
}
