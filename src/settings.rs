use config::{Config, ConfigError, File};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::authorization::AccessPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Registry {
    /// Owner identity as a hex address string; the only identity allowed to
    /// grant and revoke writer roles.
    pub owner: String,
    #[serde(default)]
    pub access_policy: AccessPolicy,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct Persistence {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_persist_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_persist_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_persist_batch_size() -> usize {
    100
}
fn default_persist_flush_interval_ms() -> u64 {
    500
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            batch_size: default_persist_batch_size(),
            flush_interval_ms: default_persist_flush_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub listen_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            enabled: default_false(),
            listen_port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub registry: Registry,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default)]
    pub metrics: Metrics,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder().add_source(File::with_name(path)).build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides
        if let Ok(owner) = env::var("REGISTRY_OWNER") {
            let trimmed = owner.trim();
            if !trimmed.is_empty() {
                settings.registry.owner = trimmed.to_string();
            }
        }
        if let Ok(raw_policy) = env::var("REGISTRY_ACCESS_POLICY") {
            match raw_policy.trim() {
                "shared_providers" => {
                    settings.registry.access_policy = AccessPolicy::SharedProviders
                }
                "separate_aggregators" => {
                    settings.registry.access_policy = AccessPolicy::SeparateAggregators
                }
                "" => {}
                other => {
                    eprintln!(
                        "Ignoring unknown REGISTRY_ACCESS_POLICY value: {}",
                        other
                    );
                }
            }
        }

        Ok(settings)
    }

    /// Parses the configured owner string into an address.
    pub fn owner_address(&self) -> anyhow::Result<Address> {
        Address::from_str(self.registry.owner.trim())
            .map_err(|e| anyhow::anyhow!("invalid registry.owner address: {}", e))
    }
}
