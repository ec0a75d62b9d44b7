use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use voya_domain::{ProviderType, ProvisionDefaults};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub approval: ApprovalRules,
    /// Auto-provisioning seeds per provider type. Business policy, supplied
    /// by deployment configuration and merged over the stock defaults.
    #[serde(default)]
    pub provisioning: HashMap<ProviderType, ProvisionDefaults>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Knobs for the approval orchestrator.
#[derive(Debug, Deserialize, Clone)]
pub struct ApprovalRules {
    /// Bounded retries for deadlock/lock-wait classes only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long a fresh allocation is held before it lapses downstream.
    #[serde(default = "default_hold_window_hours")]
    pub hold_window_hours: i64,
    #[serde(default = "default_commission_rate")]
    pub default_commission_rate: f64,
    /// Seat fare used when a flight has no cabin pricing configured.
    #[serde(default = "default_fare")]
    pub default_fare: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_hold_window_hours() -> i64 {
    24
}

fn default_commission_rate() -> f64 {
    0.10
}

fn default_fare() -> f64 {
    200.0
}

impl Default for ApprovalRules {
    fn default() -> Self {
        ApprovalRules {
            max_retries: default_max_retries(),
            hold_window_hours: default_hold_window_hours(),
            default_commission_rate: default_commission_rate(),
            default_fare: default_fare(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("VOYA").separator("__"))
            .build()?;

        let mut cfg: Config = s.try_deserialize()?;
        cfg.merge_provisioning_defaults();
        Ok(cfg)
    }

    /// Fill provider types the deployment config left unset.
    pub fn merge_provisioning_defaults(&mut self) {
        for (provider, defaults) in ProvisionDefaults::standard_map() {
            self.provisioning.entry(provider).or_insert(defaults);
        }
    }

    pub fn provisioning_for(&self, provider: ProviderType) -> ProvisionDefaults {
        self.provisioning.get(&provider).copied().unwrap_or(ProvisionDefaults {
            capacity: 0,
            price: 0.0,
        })
    }
}
