//! Player aggregate and its value objects.

mod counters;
mod inventory;
pub mod keys;
mod settings;

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use utoipa::ToSchema;

pub use self::counters::Counters;
pub use self::inventory::{
    Inventory, InventoryError, InventoryItem, ItemInventory, PlayerProduct, ProductInventory,
};
pub use self::keys::{CurrencyType, SettingType, StatType, StatisticType};
pub use self::settings::Settings;
use crate::state::{cache::Keyed, catalog::Catalog};

/// External user id of a player. Immutable once the player exists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for PlayerId {
    fn from(value: i64) -> Self {
        PlayerId(value)
    }
}

/// Authoritative in-memory state of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    id: PlayerId,
    /// Display name.
    pub name: String,
    /// Owned items.
    pub inventory: Inventory,
    /// Currency balances.
    pub currencies: Counters<CurrencyType>,
    /// Progression stats.
    pub stats: Counters<StatType>,
    /// Lifetime statistics.
    pub statistics: Counters<StatisticType>,
    /// Client preferences.
    pub settings: Settings,
}

impl Player {
    /// Fresh player with default sub-aggregates. Every currency starts at zero.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            inventory: Inventory::default(),
            currencies: Counters::from_values(
                CurrencyType::ALL.iter().map(|currency| (*currency, 0.0)),
            ),
            stats: Counters::default(),
            statistics: Counters::default(),
            settings: Settings::default(),
        }
    }

    /// External user id.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Replace every sub-aggregate present in `patch` wholesale.
    ///
    /// Sections absent from the patch are left untouched. Numeric values go
    /// through the usual clamping.
    pub fn apply_update(&mut self, patch: PlayerPatch) {
        let PlayerPatch {
            name,
            inventory,
            currencies,
            stats,
            statistics,
            settings,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(inventory) = inventory {
            self.inventory = inventory;
        }
        if let Some(values) = currencies {
            self.currencies.replace_all(values);
        }
        if let Some(values) = stats {
            self.stats.replace_all(values);
        }
        if let Some(values) = statistics {
            self.statistics.replace_all(values);
        }
        if let Some(values) = settings {
            self.settings.replace_all(values);
        }
    }
}

/// Full or partial replacement pushed by the game server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerPatch {
    /// New display name.
    pub name: Option<String>,
    /// Replacement inventory.
    pub inventory: Option<Inventory>,
    /// Replacement balances.
    pub currencies: Option<BTreeMap<CurrencyType, f64>>,
    /// Replacement stats.
    pub stats: Option<BTreeMap<StatType, f64>>,
    /// Replacement statistics.
    pub statistics: Option<BTreeMap<StatisticType, f64>>,
    /// Replacement settings.
    pub settings: Option<BTreeMap<SettingType, i32>>,
}

impl PlayerPatch {
    /// Check an inventory replacement against the catalog and size limit
    /// before it reaches the aggregate.
    pub fn validate(&self, catalog: &Catalog, capacity: usize) -> Result<(), InventoryError> {
        match &self.inventory {
            Some(inventory) => inventory.validate(catalog, capacity),
            None => Ok(()),
        }
    }
}

/// Shared slot holding one player behind an async lock.
///
/// The id is duplicated outside the lock so the directory can key entries
/// without awaiting.
#[derive(Debug)]
pub struct PlayerCell {
    id: PlayerId,
    player: RwLock<Player>,
}

/// Reference handed out by the directory. Two handles to the same player are
/// always `Arc::ptr_eq`.
pub type PlayerHandle = Arc<PlayerCell>;

impl PlayerCell {
    /// Wrap `player` in a fresh shared cell.
    pub fn new(player: Player) -> PlayerHandle {
        Arc::new(Self {
            id: player.id(),
            player: RwLock::new(player),
        })
    }

    /// Id of the held player.
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Shared access to the player.
    pub async fn read(&self) -> RwLockReadGuard<'_, Player> {
        self.player.read().await
    }

    /// Exclusive access to the player.
    pub async fn write(&self) -> RwLockWriteGuard<'_, Player> {
        self.player.write().await
    }
}

impl Keyed for PlayerCell {
    type Key = PlayerId;

    fn key(&self) -> PlayerId {
        self.id
    }
}
