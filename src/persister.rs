// Async write-through persister to keep the database off the registry fast-path

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use ethers::types::Address;
use log::{error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::authorization::WriterRole;
use crate::database::{self, DbPool};
use crate::event_stream::RegistryEvent;
use crate::metrics;
use crate::registry::AnalyticsRegistry;

/// Background task that subscribes to the registry event stream and writes
/// touched records through to PostgreSQL in batches.
///
/// Events only carry keys; the persister reads the current record back from
/// the registry at flush time. Since record writes are last-writer-wins with
/// no merge, persisting the latest state for a key is always correct even
/// when several events for it were coalesced into one batch.
pub struct RegistryPersister {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RegistryPersister {
    pub fn spawn(
        registry: Arc<AnalyticsRegistry>,
        db_pool: DbPool,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        let events = registry.subscribe();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Self::writer_task(
            registry,
            db_pool,
            events,
            shutdown_rx,
            batch_size,
            flush_interval,
        ));
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Requests a final flush and waits for the writer task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            error!("persister task panicked during shutdown: {}", e);
        }
    }

    pub fn is_healthy(&self) -> bool {
        !self.handle.is_finished()
    }

    async fn writer_task(
        registry: Arc<AnalyticsRegistry>,
        db_pool: DbPool,
        mut events: broadcast::Receiver<RegistryEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
        batch_size: usize,
        flush_interval: Duration,
    ) {
        let mut batch = PendingBatch::default();
        let mut flush_timer = interval(flush_interval);

        info!(
            "registry persister started (batch_size: {}, flush_interval: {:?})",
            batch_size, flush_interval
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            batch.absorb(event);
                            if batch.len() >= batch_size {
                                batch.flush(&registry, &db_pool).await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Lag loses key notifications; schedule a full
                            // rescan so no skipped write stays unpersisted.
                            warn!("persister lagged behind event stream, {} events skipped; scheduling full rescan", skipped);
                            metrics::increment_persist_lag_events(skipped);
                            batch.schedule_rescan(&registry).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            batch.flush(&registry, &db_pool).await;
                            info!("registry persister shutting down (event stream closed)");
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    batch.flush(&registry, &db_pool).await;
                }
                _ = shutdown_rx.recv() => {
                    batch.flush(&registry, &db_pool).await;
                    info!("registry persister shutting down (shutdown requested)");
                    break;
                }
            }
        }
    }
}

/// Keys and authorization changes accumulated between flushes.
///
/// Record keys are deduplicated; writer grant/revoke operations keep their
/// arrival order because a grant-then-revoke pair must end revoked.
#[derive(Default)]
struct PendingBatch {
    token_keys: HashSet<Address>,
    protocol_keys: HashSet<Address>,
    writer_ops: Vec<(Address, WriterRole, bool)>,
    rewrite_writers: bool,
}

impl PendingBatch {
    /// Enqueues every stored key and marks the writers table for a full
    /// rewrite from the registry's membership snapshot. Used after event
    /// stream lag, when individual change notifications were lost.
    async fn schedule_rescan(&mut self, registry: &AnalyticsRegistry) {
        self.token_keys.extend(registry.token_keys().await);
        self.protocol_keys.extend(registry.protocol_keys().await);
        // Individual ops are subsumed by the snapshot taken at flush time
        self.writer_ops.clear();
        self.rewrite_writers = true;
    }
    fn absorb(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::TokenUpdated { key, .. } => {
                self.token_keys.insert(key);
            }
            RegistryEvent::ProtocolUpdated { key, .. } => {
                self.protocol_keys.insert(key);
            }
            RegistryEvent::WriterAuthorized { identity, role, .. } => {
                self.writer_ops.push((identity, role, true));
            }
            RegistryEvent::WriterRevoked { identity, role, .. } => {
                self.writer_ops.push((identity, role, false));
            }
        }
    }

    fn len(&self) -> usize {
        self.token_keys.len() + self.protocol_keys.len() + self.writer_ops.len()
    }

    async fn flush(&mut self, registry: &AnalyticsRegistry, db_pool: &DbPool) {
        if self.len() == 0 && !self.rewrite_writers {
            return;
        }

        let start = Instant::now();
        let mut rows_written = 0u64;

        for key in self.token_keys.drain() {
            let record = registry.get_token(key).await;
            match database::upsert_token_record(db_pool, key, &record).await {
                Ok(()) => rows_written += 1,
                Err(e) => {
                    error!("failed to persist token {:?}: {}", key, e);
                    metrics::increment_persist_error("tokens");
                }
            }
        }
        if rows_written > 0 {
            metrics::increment_rows_persisted("tokens", rows_written);
        }

        let mut protocol_rows = 0u64;
        for key in self.protocol_keys.drain() {
            let record = registry.get_protocol(key).await;
            match database::upsert_protocol_record(db_pool, key, &record).await {
                Ok(()) => protocol_rows += 1,
                Err(e) => {
                    error!("failed to persist protocol {:?}: {}", key, e);
                    metrics::increment_persist_error("protocols");
                }
            }
        }
        if protocol_rows > 0 {
            metrics::increment_rows_persisted("protocols", protocol_rows);
        }

        let mut writer_rows = 0u64;
        if self.rewrite_writers {
            // The snapshot taken here also covers any ops absorbed after the
            // rescan was scheduled
            self.writer_ops.clear();
            let (providers, aggregators) = registry.writer_snapshot().await;
            match database::replace_writers(db_pool, &providers, &aggregators).await {
                Ok(()) => {
                    writer_rows = (providers.len() + aggregators.len()) as u64;
                    self.rewrite_writers = false;
                }
                Err(e) => {
                    error!("failed to rewrite writers table: {}", e);
                    metrics::increment_persist_error("writers");
                }
            }
        }
        for (identity, role, granted) in self.writer_ops.drain(..) {
            let result = if granted {
                database::save_writer(db_pool, identity, role).await
            } else {
                database::delete_writer(db_pool, identity, role).await
            };
            match result {
                Ok(()) => writer_rows += 1,
                Err(e) => {
                    error!("failed to persist writer change for {:?}: {}", identity, e);
                    metrics::increment_persist_error("writers");
                }
            }
        }
        if writer_rows > 0 {
            metrics::increment_rows_persisted("writers", writer_rows);
        }

        let total = rows_written + protocol_rows + writer_rows;
        let duration = start.elapsed();
        metrics::record_persist_flush_duration(duration);
        metrics::record_persist_batch_size(total as usize);
        info!("persisted {} rows in {:?}", total, duration);
    }
}
