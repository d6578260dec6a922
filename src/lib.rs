//! # Analytics Registry
//!
//! A permissioned in-memory registry for token and protocol analytics with
//! asynchronous PostgreSQL write-through. The registry stores per-address
//! metric records and gates every write behind an owner-managed authorization
//! layer; reads are open and total (absent keys read as zero-valued records).
//!
//! ## Overview
//!
//! The crate separates the storage core from the client-facing front-ends:
//!
//! - **Registry core**: owner-gated writer management plus the four record
//!   write paths (full submit vs. numeric-only update, for tokens and
//!   protocols) behind a single write lock.
//! - **Front-ends**: [`DataSubmitter`] for raw observational data and
//!   [`MetricsAggregator`] for pre-computed metrics, each bound to one caller
//!   identity.
//! - **Event stream**: broadcast notifications for every applied mutation,
//!   sequenced in application order.
//! - **Persistence**: a background persister that batches touched records
//!   into PostgreSQL, and loaders that rebuild registry state on restart.
//!
//! ## Access Control
//!
//! Only the owner fixed at construction may grant or revoke writer roles.
//! Which set gates which write path is selected by [`AccessPolicy`]: a single
//! shared provider set, or separate provider and aggregator sets. Revocation
//! takes effect on the next call; rejected writes leave no trace in the
//! stored data.

/// Access policies, writer roles, and the membership sets behind them
pub mod authorization;
/// PostgreSQL schema, upserts, and restart loaders
pub mod database;
/// Registry error types
pub mod error;
/// Broadcast change-notification stream
pub mod event_stream;
/// Metrics and observability
pub mod metrics;
/// Background write-through persister
pub mod persister;
/// Token and protocol record types
pub mod records;
/// The permissioned registry core
pub mod registry;
/// Configuration management
pub mod settings;

// Front-ends
/// Raw-data submission front-end
pub mod submitter;
/// Pre-aggregated-metrics front-end
pub mod aggregator;

// Re-exports for convenience
pub use aggregator::MetricsAggregator;
pub use authorization::{AccessPolicy, WriterRole};
pub use error::RegistryError;
pub use event_stream::{RegistryEvent, RegistryEventStream};
pub use persister::RegistryPersister;
pub use records::{ProtocolRecord, TokenRecord};
pub use registry::AnalyticsRegistry;
pub use settings::Settings;
pub use submitter::DataSubmitter;
