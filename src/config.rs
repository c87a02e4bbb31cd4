// ⚙️ Configuration - Catalogs as Data
// Immutable settings loaded once at startup and passed explicitly

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::masking::MaskingTable;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";
/// Environment override for the SQLite path
pub const DB_PATH_ENV: &str = "SENTINEL_DB_PATH";
/// Environment override for the HTTP bind address
pub const BIND_ADDR_ENV: &str = "SENTINEL_BIND_ADDR";

// ============================================================================
// CATALOGS
// ============================================================================

/// Reference lists the rules and the masking table are built from.
///
/// Order matters: placeholder letters are assigned by catalog index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalogs {
    #[serde(default = "default_sanctioned_entities")]
    pub sanctioned_entities: Vec<String>,

    #[serde(default = "default_high_risk_locations")]
    pub high_risk_locations: Vec<String>,

    /// Registered home location per user id
    #[serde(default = "default_user_locations")]
    pub user_locations: BTreeMap<String, String>,

    /// Where synthetic transactions may occur
    #[serde(default = "default_transaction_locations")]
    pub transaction_locations: Vec<String>,

    /// Counterparties that never trip the sanctions rule
    #[serde(default = "default_benign_merchants")]
    pub benign_merchants: Vec<String>,
}

fn default_sanctioned_entities() -> Vec<String> {
    to_strings(&[
        "Monitored Entity Alpha",
        "High-Risk Corp Beta",
        "Watchlist Inc. Gamma",
        "Global Oversight Ltd.",
    ])
}

fn default_high_risk_locations() -> Vec<String> {
    to_strings(&["Moscow", "Cayman Islands"])
}

fn default_user_locations() -> BTreeMap<String, String> {
    [
        ("user123", "New York"),
        ("user456", "London"),
        ("user789", "Tokyo"),
    ]
    .iter()
    .map(|(user, location)| (user.to_string(), location.to_string()))
    .collect()
}

fn default_transaction_locations() -> Vec<String> {
    to_strings(&[
        "New York",
        "London",
        "Tokyo",
        "Moscow",
        "Beijing",
        "Cayman Islands",
    ])
}

fn default_benign_merchants() -> Vec<String> {
    to_strings(&["GoodCorp", "Service XYZ", "OnlineStore"])
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Catalogs {
    fn default() -> Self {
        Catalogs {
            sanctioned_entities: default_sanctioned_entities(),
            high_risk_locations: default_high_risk_locations(),
            user_locations: default_user_locations(),
            transaction_locations: default_transaction_locations(),
            benign_merchants: default_benign_merchants(),
        }
    }
}

// ============================================================================
// ASSISTANT SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_model_id() -> String {
    "amazon.nova-pro-v1:0".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for AssistantConfig {
    fn default() -> Self {
        AssistantConfig {
            model_id: default_model_id(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Chance that the placeholder velocity rule fires (0.0 - 1.0)
    #[serde(default = "default_velocity_probability")]
    pub velocity_probability: f64,

    /// Smallest batch the feed simulates per poll
    #[serde(default = "default_min_batch")]
    pub simulate_min_batch: usize,

    /// Largest batch the feed simulates per poll
    #[serde(default = "default_max_batch")]
    pub simulate_max_batch: usize,

    #[serde(default)]
    pub catalogs: Catalogs,

    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("database.db")
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_velocity_probability() -> f64 {
    0.05
}

fn default_min_batch() -> usize {
    1
}

fn default_max_batch() -> usize {
    4
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            velocity_probability: default_velocity_probability(),
            simulate_min_batch: default_min_batch(),
            simulate_max_batch: default_max_batch(),
            catalogs: Catalogs::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Load config from a JSON file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: SentinelConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.check()?;
        Ok(config)
    }

    /// Resolve config: explicit path, then `SENTINEL_CONFIG`, then defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        tracing::debug!(db_path = ?config.db_path, bind_addr = %config.bind_addr, "configuration loaded");
        Ok(config)
    }

    /// Apply `SENTINEL_DB_PATH` / `SENTINEL_BIND_ADDR` if set
    pub fn apply_env_overrides(&mut self) {
        if let Some(db_path) = env::var_os(DB_PATH_ENV) {
            self.db_path = PathBuf::from(db_path);
        }
        if let Ok(bind_addr) = env::var(BIND_ADDR_ENV) {
            self.bind_addr = bind_addr;
        }
    }

    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.velocity_probability) {
            anyhow::bail!(
                "velocity_probability must be between 0.0 and 1.0, got {}",
                self.velocity_probability
            );
        }
        if self.simulate_min_batch == 0 || self.simulate_min_batch > self.simulate_max_batch {
            anyhow::bail!(
                "invalid simulate batch bounds {}..={}",
                self.simulate_min_batch,
                self.simulate_max_batch
            );
        }
        // Catalogs must yield a collision-free masking table
        MaskingTable::build(
            &self.catalogs.sanctioned_entities,
            &self.catalogs.high_risk_locations,
        )
        .context("catalogs cannot be masked")?;
        Ok(())
    }
}
