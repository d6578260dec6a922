use crate::authorization::WriterRole;
use crate::records::{ProtocolRecord, TokenRecord};
use anyhow::Result;
use chrono::Utc;
use ethers::types::{Address, U256};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use std::collections::{HashMap, HashSet};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// PostgreSQL connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Database schema name
pub const SCHEMA: &str = "analytics";

pub async fn connect() -> Result<DbPool> {
    // Force UTF-8 client encoding FIRST to avoid Windows sqlx bug with non-ASCII error messages
    env::set_var("PGCLIENTENCODING", "UTF8");

    let database_url =
        env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    // Add retries with exponential backoff to survive DNS/startup races in Compose
    let mut last_err: Option<anyhow::Error> = None;
    let max_attempts: u32 = 10;
    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&database_url)
            .await
        {
            Ok(pool) => {
                log::info!(
                    "Connected to database (attempt {}/{}).",
                    attempt,
                    max_attempts
                );
                if let Err(e) = initialize_database(&pool).await {
                    last_err = Some(e);
                } else {
                    return Ok(pool);
                }
            }
            Err(e) => {
                last_err = Some(e.into());
            }
        }
        // Backoff with cap
        let delay_ms = (1u64 << attempt.min(6)) * 200;
        log::warn!(
            "DB connect/init attempt {}/{} failed. Retrying in {} ms...",
            attempt,
            max_attempts,
            delay_ms
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Unknown DB connection error")))
}

pub async fn initialize_database(pool: &DbPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x414E414C59544943; // "ANALYTIC" in hex

    let mut tx = pool.begin().await?;

    log::info!("Acquiring database migration lock...");
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(tx.as_mut())
        .await?;

    create_tables(&mut tx).await?;

    sqlx::query(&format!(
        "INSERT INTO {}.configurations (key, value) VALUES ('db_initialized', 'true'), ('registry_version', '0.1.0') ON CONFLICT (key) DO NOTHING",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    tx.commit().await?;
    log::info!("Database initialization complete, transaction committed.");

    Ok(())
}

async fn create_tables(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<()> {
    // Configurations table (created first so initialize_database can seed it)
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.configurations (
            key VARCHAR(100) PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    // Token records: overwrite-in-place, keyed by address, U256 fields stored
    // as decimal strings to avoid precision loss
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.tokens (
            address VARCHAR(42) PRIMARY KEY,
            name TEXT NOT NULL,
            price TEXT NOT NULL,
            volume TEXT NOT NULL,
            market_cap TEXT NOT NULL,
            holders BIGINT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    // Protocol records
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.protocols (
            address VARCHAR(42) PRIMARY KEY,
            name TEXT NOT NULL,
            tvl TEXT NOT NULL,
            volume24h TEXT NOT NULL,
            unique_users BIGINT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    // Authorization entries; role distinguishes the provider and aggregator sets
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.writers (
            identity VARCHAR(42) NOT NULL,
            role VARCHAR(16) NOT NULL,
            granted_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (identity, role)
        )",
        SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    Ok(())
}

pub async fn upsert_token_record(pool: &DbPool, key: Address, record: &TokenRecord) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {}.tokens (address, name, price, volume, market_cap, holders, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT(address) DO UPDATE SET
            name=excluded.name,
            price=excluded.price,
            volume=excluded.volume,
            market_cap=excluded.market_cap,
            holders=excluded.holders,
            updated_at=excluded.updated_at",
        SCHEMA
    ))
    .bind(format!("{:?}", key))
    .bind(&record.name)
    .bind(record.price.to_string())
    .bind(record.volume.to_string())
    .bind(record.market_cap.to_string())
    .bind(record.holders as i64)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_protocol_record(
    pool: &DbPool,
    key: Address,
    record: &ProtocolRecord,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {}.protocols (address, name, tvl, volume24h, unique_users, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT(address) DO UPDATE SET
            name=excluded.name,
            tvl=excluded.tvl,
            volume24h=excluded.volume24h,
            unique_users=excluded.unique_users,
            updated_at=excluded.updated_at",
        SCHEMA
    ))
    .bind(format!("{:?}", key))
    .bind(&record.name)
    .bind(record.tvl.to_string())
    .bind(record.volume24h.to_string())
    .bind(record.unique_users as i64)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn save_writer(pool: &DbPool, identity: Address, role: WriterRole) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {}.writers (identity, role, granted_at)
         VALUES ($1, $2, $3)
         ON CONFLICT(identity, role) DO NOTHING",
        SCHEMA
    ))
    .bind(format!("{:?}", identity))
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Rewrites the writers table from a full membership snapshot.
pub async fn replace_writers(
    pool: &DbPool,
    providers: &HashSet<Address>,
    aggregators: &HashSet<Address>,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DELETE FROM {}.writers", SCHEMA))
        .execute(tx.as_mut())
        .await?;
    for (set, role) in [
        (providers, WriterRole::Provider),
        (aggregators, WriterRole::Aggregator),
    ] {
        for identity in set {
            sqlx::query(&format!(
                "INSERT INTO {}.writers (identity, role, granted_at) VALUES ($1, $2, $3)",
                SCHEMA
            ))
            .bind(format!("{:?}", identity))
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(tx.as_mut())
            .await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

pub async fn delete_writer(pool: &DbPool, identity: Address, role: WriterRole) -> Result<()> {
    sqlx::query(&format!(
        "DELETE FROM {}.writers WHERE identity = $1 AND role = $2",
        SCHEMA
    ))
    .bind(format!("{:?}", identity))
    .bind(role.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_token_records(pool: &DbPool) -> Result<HashMap<Address, TokenRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT address, name, price, volume, market_cap, holders FROM {}.tokens",
        SCHEMA
    ))
    .fetch_all(pool)
    .await?;

    let mut records = HashMap::with_capacity(rows.len());
    for row in rows {
        let address: String = row.try_get("address")?;
        let key = Address::from_str(&address)
            .map_err(|e| anyhow::anyhow!("corrupt token address {}: {}", address, e))?;
        records.insert(
            key,
            TokenRecord {
                name: row.try_get("name")?,
                price: parse_u256(row.try_get("price")?)?,
                volume: parse_u256(row.try_get("volume")?)?,
                market_cap: parse_u256(row.try_get("market_cap")?)?,
                holders: row.try_get::<i64, _>("holders")? as u64,
            },
        );
    }
    Ok(records)
}

pub async fn load_protocol_records(pool: &DbPool) -> Result<HashMap<Address, ProtocolRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT address, name, tvl, volume24h, unique_users FROM {}.protocols",
        SCHEMA
    ))
    .fetch_all(pool)
    .await?;

    let mut records = HashMap::with_capacity(rows.len());
    for row in rows {
        let address: String = row.try_get("address")?;
        let key = Address::from_str(&address)
            .map_err(|e| anyhow::anyhow!("corrupt protocol address {}: {}", address, e))?;
        records.insert(
            key,
            ProtocolRecord {
                name: row.try_get("name")?,
                tvl: parse_u256(row.try_get("tvl")?)?,
                volume24h: parse_u256(row.try_get("volume24h")?)?,
                unique_users: row.try_get::<i64, _>("unique_users")? as u64,
            },
        );
    }
    Ok(records)
}

/// Loads persisted authorization entries as (providers, aggregators).
pub async fn load_writers(pool: &DbPool) -> Result<(HashSet<Address>, HashSet<Address>)> {
    let rows = sqlx::query(&format!("SELECT identity, role FROM {}.writers", SCHEMA))
        .fetch_all(pool)
        .await?;

    let mut providers = HashSet::new();
    let mut aggregators = HashSet::new();
    for row in rows {
        let identity: String = row.try_get("identity")?;
        let role: String = row.try_get("role")?;
        let address = Address::from_str(&identity)
            .map_err(|e| anyhow::anyhow!("corrupt writer identity {}: {}", identity, e))?;
        match role.as_str() {
            "provider" => {
                providers.insert(address);
            }
            "aggregator" => {
                aggregators.insert(address);
            }
            other => {
                log::warn!("skipping writer {} with unknown role '{}'", identity, other);
            }
        }
    }
    Ok((providers, aggregators))
}

fn parse_u256(raw: String) -> Result<U256> {
    U256::from_dec_str(&raw).map_err(|e| anyhow::anyhow!("corrupt U256 value {}: {}", raw, e))
}
