//! Stored representation of a player in the `players` collection.
//!
//! ```text
//! { id: Int64, name: String,
//!   inventory: { pets:   { <uuid>: { id: Int64, active: Bool } },
//!                trails: { <uuid>: { id: Int64, active: Bool } },
//!                products: { <id>: { id: Int64, amount: Int64 } } },
//!   currencies: { GOLD: Double }, stats: { <STAT>: Double },
//!   statistics: { <STATISTIC>: Double }, settings: { <SETTING>: Int32 } }
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;
use mongodb::bson::{self, Document, doc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::fmt::Hyphenated;

use crate::state::player::{
    CurrencyType, Counters, Inventory, InventoryItem, ItemInventory, Player, PlayerId,
    PlayerProduct, ProductInventory, SettingType, Settings, StatType, StatisticType,
};

/// Name of the collection holding player records.
pub const PLAYER_COLLECTION: &str = "players";
/// Field used as the lookup key; carries a unique index.
pub const ID_FIELD: &str = "id";

/// Top-level fields of a player record that can be written independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerField {
    /// Display name.
    Name,
    /// Pets, trails and products.
    Inventory,
    /// Currency balances.
    Currencies,
    /// Progression stats.
    Stats,
    /// Lifetime statistics.
    Statistics,
    /// Client preferences.
    Settings,
}

impl PlayerField {
    /// Every writable field.
    pub const ALL: [PlayerField; 6] = [
        PlayerField::Name,
        PlayerField::Inventory,
        PlayerField::Currencies,
        PlayerField::Stats,
        PlayerField::Statistics,
        PlayerField::Settings,
    ];

    /// Key of the field in the stored record.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerField::Name => "name",
            PlayerField::Inventory => "inventory",
            PlayerField::Currencies => "currencies",
            PlayerField::Stats => "stats",
            PlayerField::Statistics => "statistics",
            PlayerField::Settings => "settings",
        }
    }
}

/// A player record that could not be converted to or from BSON.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RecordError(#[from] bson::error::Error);

/// Document stored for one player.
///
/// Sections missing from an older record hydrate as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDocument {
    id: i64,
    name: String,
    #[serde(default)]
    inventory: InventoryDocument,
    #[serde(default)]
    currencies: BTreeMap<CurrencyType, f64>,
    #[serde(default)]
    stats: BTreeMap<StatType, f64>,
    #[serde(default)]
    statistics: BTreeMap<StatisticType, f64>,
    #[serde(default)]
    settings: BTreeMap<SettingType, i32>,
}

/// Inventory section; cosmetics are keyed by their hyphenated uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pets: IndexMap<Hyphenated, ItemDocument>,
    #[serde(default)]
    trails: IndexMap<Hyphenated, ItemDocument>,
    #[serde(default)]
    products: IndexMap<String, ProductDocument>,
}

/// Owned pet or trail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    id: u32,
    #[serde(default)]
    active: bool,
}

/// Product stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    id: i64,
    amount: u32,
}

fn item_documents(items: &ItemInventory) -> IndexMap<Hyphenated, ItemDocument> {
    items
        .items()
        .map(|item| {
            (
                item.uid.hyphenated(),
                ItemDocument {
                    id: item.type_id,
                    active: item.active,
                },
            )
        })
        .collect()
}

fn inventory_items(items: IndexMap<Hyphenated, ItemDocument>) -> ItemInventory {
    ItemInventory::from_items(items.into_iter().map(|(uid, item)| InventoryItem {
        uid: uid.into_uuid(),
        type_id: item.id,
        active: item.active,
    }))
}

impl From<&Inventory> for InventoryDocument {
    fn from(value: &Inventory) -> Self {
        Self {
            pets: item_documents(&value.pets),
            trails: item_documents(&value.trails),
            products: value
                .products
                .items()
                .map(|product| {
                    (
                        product.id.to_string(),
                        ProductDocument {
                            id: product.id,
                            amount: product.amount,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl From<InventoryDocument> for Inventory {
    fn from(value: InventoryDocument) -> Self {
        Self {
            pets: inventory_items(value.pets),
            trails: inventory_items(value.trails),
            products: ProductInventory::from_items(value.products.into_values().map(
                |product| PlayerProduct {
                    id: product.id,
                    amount: product.amount,
                },
            )),
        }
    }
}

impl From<&Player> for PlayerDocument {
    fn from(value: &Player) -> Self {
        Self {
            id: value.id().0,
            name: value.name.clone(),
            inventory: InventoryDocument::from(&value.inventory),
            currencies: value.currencies.iter().collect(),
            stats: value.stats.iter().collect(),
            statistics: value.statistics.iter().collect(),
            settings: value.settings.iter().collect(),
        }
    }
}

impl From<PlayerDocument> for Player {
    fn from(value: PlayerDocument) -> Self {
        let mut player = Player::new(PlayerId(value.id), value.name);
        player.inventory = value.inventory.into();
        player.currencies = Counters::from_values(value.currencies);
        player.stats = Counters::from_values(value.stats);
        player.statistics = Counters::from_values(value.statistics);
        player.settings = Settings::from_values(value.settings);
        player
    }
}

/// Filter selecting the record of `id`.
pub fn query_key(id: PlayerId) -> Document {
    doc! { ID_FIELD: id.0 }
}

/// Complete record, identifier included.
pub fn encode_player(player: &Player) -> Result<Document, RecordError> {
    Ok(bson::serialize_to_document(&PlayerDocument::from(player))?)
}

/// Only the requested top-level fields, ready for a `$set`.
pub fn encode_fields(player: &Player, fields: &[PlayerField]) -> Result<Document, RecordError> {
    let mut record = encode_player(player)?;
    Ok(fields
        .iter()
        .filter_map(|field| {
            record
                .remove(field.as_str())
                .map(|value| (field.as_str().to_owned(), value))
        })
        .collect())
}

/// Rebuild a player from its record. Unknown enum keys are rejected.
pub fn decode_player(document: Document) -> Result<Player, RecordError> {
    let document: PlayerDocument = bson::deserialize_from_document(document)?;
    Ok(document.into())
}
