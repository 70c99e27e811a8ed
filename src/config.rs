//! Application-level configuration loading: cache lifetimes, persistence
//! schedule, inventory limits and the item catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::catalog::{
    Catalog, CosmeticDefinition, CosmeticKind, ProductDefinition, TrailStyle,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRAVO_BACK_CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How long idle players stay in memory and how often expiry is checked.
pub struct CacheConfig {
    /// Idle time after which a player is evicted.
    pub ttl: Duration,
    /// Period of the eviction sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Write-behind schedule and storage round-trip limit.
pub struct PersistenceConfig {
    /// Delay before the first scheduled flush after startup.
    pub initial_delay: Duration,
    /// Period between scheduled flushes.
    pub period: Duration,
    /// Upper bound for a single storage call.
    pub store_timeout: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5 * 60),
            period: Duration::from_secs(60),
            store_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Eviction settings.
    pub cache: CacheConfig,
    /// Flush schedule and store timeout.
    pub persistence: PersistenceConfig,
    /// Maximum number of items per cosmetic inventory.
    pub inventory_size: usize,
    /// Cosmetic and product definitions.
    pub catalog: Catalog,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    let (pets, trails, products) = app_config.catalog.sizes();
                    info!(
                        path = %path.display(),
                        pets,
                        trails,
                        products,
                        ttl_secs = app_config.cache.ttl.as_secs(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document. Missing keys take their default.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            persistence: PersistenceConfig::default(),
            inventory_size: DEFAULT_INVENTORY_SIZE,
            catalog: Catalog::default(),
        }
    }
}

const DEFAULT_INVENTORY_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    cache: RawCache,
    persistence: RawPersistence,
    inventory: RawInventory,
    catalog: RawCatalog,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCache {
    ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPersistence {
    initial_delay_secs: Option<u64>,
    period_secs: Option<u64>,
    store_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInventory {
    size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCatalog {
    pets: Vec<RawPet>,
    trails: Vec<RawTrail>,
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct RawPet {
    id: u32,
    name: String,
    asset_id: String,
}

#[derive(Debug, Deserialize)]
struct RawTrail {
    id: u32,
    name: String,
    asset_id: String,
    style: TrailStyle,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    id: i64,
    cap: u32,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let cache_defaults = CacheConfig::default();
        let persistence_defaults = PersistenceConfig::default();

        let cache = CacheConfig {
            ttl: secs_or(value.cache.ttl_secs, cache_defaults.ttl),
            sweep_interval: secs_or(
                value.cache.sweep_interval_secs,
                cache_defaults.sweep_interval,
            ),
        };
        let persistence = PersistenceConfig {
            initial_delay: secs_or(
                value.persistence.initial_delay_secs,
                persistence_defaults.initial_delay,
            ),
            period: secs_or(value.persistence.period_secs, persistence_defaults.period),
            store_timeout: value
                .persistence
                .store_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(persistence_defaults.store_timeout),
        };

        let pets = value.catalog.pets.into_iter().map(|pet| CosmeticDefinition {
            id: pet.id,
            name: pet.name,
            asset_id: pet.asset_id,
            kind: CosmeticKind::Pet,
        });
        let trails = value
            .catalog
            .trails
            .into_iter()
            .map(|trail| CosmeticDefinition {
                id: trail.id,
                name: trail.name,
                asset_id: trail.asset_id,
                kind: CosmeticKind::Trail(trail.style),
            });
        let products = value
            .catalog
            .products
            .into_iter()
            .map(|product| ProductDefinition {
                id: product.id,
                cap: product.cap,
            });

        Self {
            cache,
            persistence,
            inventory_size: value.inventory.size.unwrap_or(DEFAULT_INVENTORY_SIZE),
            catalog: Catalog::new(pets.chain(trails), products),
        }
    }
}

/// Zero would turn the periodic jobs into busy loops.
fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
