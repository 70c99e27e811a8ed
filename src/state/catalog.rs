//! Read-only reference data describing what can end up in a player's
//! inventory. Loaded once from configuration and shared by every request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Inventory section a cosmetic lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CosmeticSlot {
    /// Companion following the avatar.
    Pet,
    /// Particle trail attached to the avatar.
    Trail,
}

/// How a trail is rendered by the game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailStyle {
    /// Emitted from the avatar's feet.
    Feet,
    /// Follows the avatar's path.
    Follow,
}

/// Discriminant replacing a per-kind definition hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CosmeticKind {
    Pet,
    Trail(TrailStyle),
}

impl CosmeticKind {
    /// Inventory the cosmetic lives in.
    pub fn slot(self) -> CosmeticSlot {
        match self {
            CosmeticKind::Pet => CosmeticSlot::Pet,
            CosmeticKind::Trail(_) => CosmeticSlot::Trail,
        }
    }
}

/// Static definition of a pet or a trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmeticDefinition {
    /// Catalog id, unique per kind.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Client package holding the model/effect.
    pub asset_id: String,
    /// Pet or trail flavour.
    pub kind: CosmeticKind,
}

/// Static definition of a purchasable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductDefinition {
    /// Catalog id.
    pub id: i64,
    /// Maximum amount a single player may hold.
    pub cap: u32,
}

/// Lookup tables for every catalog entry.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pets: HashMap<u32, CosmeticDefinition>,
    trails: HashMap<u32, CosmeticDefinition>,
    products: HashMap<i64, ProductDefinition>,
}

impl Catalog {
    /// Build the catalog, skipping (and logging) duplicate identifiers.
    pub fn new(
        cosmetics: impl IntoIterator<Item = CosmeticDefinition>,
        products: impl IntoIterator<Item = ProductDefinition>,
    ) -> Self {
        let mut catalog = Self::default();

        for cosmetic in cosmetics {
            let slot = cosmetic.kind.slot();
            let table = match slot {
                CosmeticSlot::Pet => &mut catalog.pets,
                CosmeticSlot::Trail => &mut catalog.trails,
            };
            if table.contains_key(&cosmetic.id) {
                warn!(?slot, id = cosmetic.id, "duplicate cosmetic in catalog; keeping the first");
                continue;
            }
            table.insert(cosmetic.id, cosmetic);
        }

        for product in products {
            if catalog.products.contains_key(&product.id) {
                warn!(id = product.id, "duplicate product in catalog; keeping the first");
                continue;
            }
            catalog.products.insert(product.id, product);
        }

        catalog
    }

    /// Find a pet or trail definition.
    pub fn cosmetic(&self, slot: CosmeticSlot, id: u32) -> Option<&CosmeticDefinition> {
        match slot {
            CosmeticSlot::Pet => self.pets.get(&id),
            CosmeticSlot::Trail => self.trails.get(&id),
        }
    }

    /// Find a product definition.
    pub fn product(&self, id: i64) -> Option<&ProductDefinition> {
        self.products.get(&id)
    }

    /// Number of entries per table, in `(pets, trails, products)` order.
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.pets.len(), self.trails.len(), self.products.len())
    }
}
