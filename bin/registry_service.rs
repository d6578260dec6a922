//! # Registry Service
//!
//! Long-running host process for the analytics registry: restores state from
//! PostgreSQL, runs the background persister, and keeps the registry available
//! for in-process clients until shutdown.
//!
//! ## Overview
//!
//! This service:
//! - Loads settings from `Config.toml` (with env var overrides)
//! - Restores records and writer sets from the database
//! - Spawns the write-through persister (configurable via `[persistence]`)
//! - Handles graceful shutdown on Ctrl+C (final flush included)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin registry_service
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use analytics_registry::{
    database, metrics, persister::RegistryPersister, registry::AnalyticsRegistry,
    settings::Settings,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Observability builds route both `log` and `tracing` output through the
    // fmt subscriber; plain builds use env_logger.
    #[cfg(feature = "observability")]
    tracing_subscriber::fmt::init();
    #[cfg(not(feature = "observability"))]
    env_logger::init();

    println!("🚀 Starting Analytics Registry Service");
    println!("═══════════════════════════════════════════════════════════════════\n");

    // 1. Load settings
    let settings = Settings::new()?;
    let owner = settings.owner_address()?;
    println!("✅ Settings loaded (policy: {:?})", settings.registry.access_policy);

    // 2. Metrics exporter (observability builds only)
    metrics::describe_metrics();
    #[cfg(feature = "observability")]
    if settings.metrics.enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], settings.metrics.listen_port))
            .install()?;
        println!(
            "✅ Prometheus exporter listening on :{}",
            settings.metrics.listen_port
        );
    }

    // 3. Connect to database
    let db_pool = database::connect().await?;
    println!("✅ Database connected");

    // 4. Restore registry state
    let tokens = database::load_token_records(&db_pool).await?;
    let protocols = database::load_protocol_records(&db_pool).await?;
    let (providers, aggregators) = database::load_writers(&db_pool).await?;
    println!(
        "✅ State restored ({} tokens, {} protocols, {} providers, {} aggregators)",
        tokens.len(),
        protocols.len(),
        providers.len(),
        aggregators.len()
    );

    let registry = Arc::new(AnalyticsRegistry::restore(
        owner,
        settings.registry.access_policy,
        settings.registry.event_capacity,
        tokens,
        protocols,
        providers,
        aggregators,
    ));

    // 5. Spawn write-through persister
    let persister = if settings.persistence.enabled {
        let persister = RegistryPersister::spawn(
            registry.clone(),
            db_pool.clone(),
            settings.persistence.batch_size,
            Duration::from_millis(settings.persistence.flush_interval_ms),
        );
        println!(
            "✅ Persister started (batch_size: {}, flush every {} ms)",
            settings.persistence.batch_size, settings.persistence.flush_interval_ms
        );
        Some(persister)
    } else {
        println!("⚠️  Persistence disabled; registry state is in-memory only");
        None
    };

    // 6. Heartbeat task
    let heartbeat_registry = registry.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            metrics::record_heartbeat();
            log::info!(
                "registry heartbeat: {} tokens, {} protocols, {} event subscribers",
                heartbeat_registry.token_count().await,
                heartbeat_registry.protocol_count().await,
                heartbeat_registry.event_subscriber_count()
            );
        }
    });

    // 7. Wait for shutdown signal
    println!("\n💡 Service running (owner: {:?})", owner);
    println!("Press Ctrl+C to stop gracefully...\n");

    signal::ctrl_c().await?;
    println!("\n🛑 Shutdown signal received, stopping tasks...");

    heartbeat_handle.abort();
    if let Some(persister) = persister {
        persister.shutdown().await;
        println!("✅ Persister flushed and stopped");
    }

    println!("✅ Shutdown complete");

    Ok(())
}
