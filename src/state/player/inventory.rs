use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::state::catalog::{Catalog, CosmeticSlot};

/// Rejections raised synchronously by inventory mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The cosmetic inventory already holds `capacity` items.
    #[error("{slot:?} inventory is full (capacity {capacity})")]
    Full { slot: CosmeticSlot, capacity: usize },
    /// No catalog entry for the requested cosmetic.
    #[error("{slot:?} `{id}` does not exist in the catalog")]
    UnknownCosmetic { slot: CosmeticSlot, id: u32 },
    /// No catalog entry for the requested product.
    #[error("product `{id}` does not exist in the catalog")]
    UnknownProduct { id: i64 },
    /// Adding would push the product over its catalog cap.
    #[error("product `{id}` amount {requested} exceeds cap {cap}")]
    ProductCap { id: i64, requested: u32, cap: u32 },
    /// The player does not own the referenced item.
    #[error("item `{0}` is not owned")]
    NotOwned(String),
}

/// Owned pet or trail instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    /// Unique id of this instance, stable for the lifetime of the item.
    pub uid: Uuid,
    /// Catalog identifier of the cosmetic.
    pub type_id: u32,
    /// Whether the item is currently equipped.
    pub active: bool,
}

/// Cosmetic items keyed by their unique id, kept in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemInventory {
    items: IndexMap<Uuid, InventoryItem>,
}

impl ItemInventory {
    /// Index `items` by uid; a repeated uid keeps the last item.
    pub fn from_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.uid, item)).collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is owned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Owned item with `uid`.
    pub fn get(&self, uid: Uuid) -> Option<&InventoryItem> {
        self.items.get(&uid)
    }

    /// Every item in acquisition order.
    pub fn items(&self) -> impl Iterator<Item = &InventoryItem> + '_ {
        self.items.values()
    }

    /// Items currently equipped (`true`) or stored (`false`).
    pub fn items_by_state(&self, active: bool) -> impl Iterator<Item = &InventoryItem> + '_ {
        self.items.values().filter(move |item| item.active == active)
    }

    /// Append a fresh, unequipped instance of `type_id` under a random uid.
    fn insert_new(
        &mut self,
        slot: CosmeticSlot,
        type_id: u32,
        capacity: usize,
    ) -> Result<Uuid, InventoryError> {
        if self.items.len() >= capacity {
            return Err(InventoryError::Full { slot, capacity });
        }

        let mut uid = Uuid::new_v4();
        while self.items.contains_key(&uid) {
            uid = Uuid::new_v4();
        }

        self.items.insert(
            uid,
            InventoryItem {
                uid,
                type_id,
                active: false,
            },
        );
        Ok(uid)
    }

    /// Equip or unequip an owned item.
    pub fn set_active(&mut self, uid: Uuid, active: bool) -> Result<(), InventoryError> {
        let item = self
            .items
            .get_mut(&uid)
            .ok_or_else(|| InventoryError::NotOwned(uid.to_string()))?;
        item.active = active;
        Ok(())
    }

    /// Drop an owned item.
    pub fn remove(&mut self, uid: Uuid) -> Option<InventoryItem> {
        self.items.shift_remove(&uid)
    }

    /// Replace the whole inventory.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = InventoryItem>) {
        *self = Self::from_items(items);
    }
}

/// Product stack owned by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerProduct {
    /// Catalog id of the product.
    pub id: i64,
    /// Units held.
    pub amount: u32,
}

/// Products keyed by catalog id. One stack per product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInventory {
    items: IndexMap<i64, PlayerProduct>,
}

impl ProductInventory {
    /// Index `items` by product id.
    pub fn from_items(items: impl IntoIterator<Item = PlayerProduct>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|product| (product.id, product))
                .collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is owned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stack of product `id`.
    pub fn get(&self, id: i64) -> Option<&PlayerProduct> {
        self.items.get(&id)
    }

    /// Every stack in acquisition order.
    pub fn items(&self) -> impl Iterator<Item = &PlayerProduct> + '_ {
        self.items.values()
    }

    /// Take away `amount` units; the stack disappears once it reaches zero.
    pub fn remove_amount(&mut self, id: i64, amount: u32) -> Result<u32, InventoryError> {
        let product = self
            .items
            .get_mut(&id)
            .ok_or_else(|| InventoryError::NotOwned(id.to_string()))?;
        product.amount = product.amount.saturating_sub(amount);
        let left = product.amount;
        if left == 0 {
            self.items.shift_remove(&id);
        }
        Ok(left)
    }

    /// Drop the whole stack of product `id`.
    pub fn remove(&mut self, id: i64) -> Option<PlayerProduct> {
        self.items.shift_remove(&id)
    }

    /// Replace every stack.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = PlayerProduct>) {
        *self = Self::from_items(items);
    }
}

/// Everything a player owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Owned pets.
    pub pets: ItemInventory,
    /// Owned trails.
    pub trails: ItemInventory,
    /// Product stacks.
    pub products: ProductInventory,
}

impl Inventory {
    /// Pets or trails.
    pub fn cosmetics(&self, slot: CosmeticSlot) -> &ItemInventory {
        match slot {
            CosmeticSlot::Pet => &self.pets,
            CosmeticSlot::Trail => &self.trails,
        }
    }

    /// Mutable pets or trails.
    pub fn cosmetics_mut(&mut self, slot: CosmeticSlot) -> &mut ItemInventory {
        match slot {
            CosmeticSlot::Pet => &mut self.pets,
            CosmeticSlot::Trail => &mut self.trails,
        }
    }

    /// Grant a new pet or trail instance.
    ///
    /// The cosmetic must exist in the catalog and the target inventory must
    /// hold fewer than `capacity` items.
    pub fn add_cosmetic(
        &mut self,
        catalog: &Catalog,
        slot: CosmeticSlot,
        type_id: u32,
        capacity: usize,
    ) -> Result<Uuid, InventoryError> {
        if catalog.cosmetic(slot, type_id).is_none() {
            return Err(InventoryError::UnknownCosmetic { slot, id: type_id });
        }
        self.cosmetics_mut(slot).insert_new(slot, type_id, capacity)
    }

    /// Ensure every held item references the catalog and that each cosmetic
    /// inventory fits within `capacity`.
    pub fn validate(&self, catalog: &Catalog, capacity: usize) -> Result<(), InventoryError> {
        for slot in [CosmeticSlot::Pet, CosmeticSlot::Trail] {
            let items = self.cosmetics(slot);
            if items.len() > capacity {
                return Err(InventoryError::Full { slot, capacity });
            }
            if let Some(item) = items
                .items()
                .find(|item| catalog.cosmetic(slot, item.type_id).is_none())
            {
                return Err(InventoryError::UnknownCosmetic {
                    slot,
                    id: item.type_id,
                });
            }
        }

        for product in self.products.items() {
            let definition = catalog
                .product(product.id)
                .ok_or(InventoryError::UnknownProduct { id: product.id })?;
            if product.amount > definition.cap {
                return Err(InventoryError::ProductCap {
                    id: product.id,
                    requested: product.amount,
                    cap: definition.cap,
                });
            }
        }

        Ok(())
    }

    /// Grant `amount` units of a product, merging into an existing stack.
    /// Returns the resulting amount.
    pub fn add_product(
        &mut self,
        catalog: &Catalog,
        id: i64,
        amount: u32,
    ) -> Result<u32, InventoryError> {
        let definition = catalog
            .product(id)
            .ok_or(InventoryError::UnknownProduct { id })?;

        let held = self.products.get(id).map_or(0, |product| product.amount);
        let requested = held.saturating_add(amount);
        if requested > definition.cap {
            return Err(InventoryError::ProductCap {
                id,
                requested,
                cap: definition.cap,
            });
        }

        self.products.items.insert(
            id,
            PlayerProduct {
                id,
                amount: requested,
            },
        );
        Ok(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::catalog::{CosmeticDefinition, CosmeticKind, ProductDefinition};

    fn catalog() -> Catalog {
        Catalog::new(
            [CosmeticDefinition {
                id: 3,
                name: "Fox".into(),
                asset_id: "rbx-3".into(),
                kind: CosmeticKind::Pet,
            }],
            [ProductDefinition { id: 77, cap: 5 }],
        )
    }

    #[test]
    fn add_cosmetic_generates_unique_inactive_items() {
        let mut inventory = Inventory::default();
        let catalog = catalog();

        let first = inventory
            .add_cosmetic(&catalog, CosmeticSlot::Pet, 3, 10)
            .unwrap();
        let second = inventory
            .add_cosmetic(&catalog, CosmeticSlot::Pet, 3, 10)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(inventory.pets.len(), 2);
        assert!(inventory.pets.items().all(|item| !item.active));
    }

    #[test]
    fn add_cosmetic_enforces_capacity() {
        let mut inventory = Inventory::default();
        let catalog = catalog();
        inventory
            .add_cosmetic(&catalog, CosmeticSlot::Pet, 3, 1)
            .unwrap();

        let err = inventory
            .add_cosmetic(&catalog, CosmeticSlot::Pet, 3, 1)
            .unwrap_err();

        assert_eq!(
            err,
            InventoryError::Full {
                slot: CosmeticSlot::Pet,
                capacity: 1
            }
        );
        assert_eq!(inventory.pets.len(), 1);
    }

    #[test]
    fn add_cosmetic_rejects_unknown_catalog_entries() {
        let mut inventory = Inventory::default();
        let err = inventory
            .add_cosmetic(&catalog(), CosmeticSlot::Trail, 3, 10)
            .unwrap_err();
        assert_eq!(
            err,
            InventoryError::UnknownCosmetic {
                slot: CosmeticSlot::Trail,
                id: 3
            }
        );
        assert!(inventory.trails.is_empty());
    }

    #[test]
    fn set_active_toggles_only_owned_items() {
        let mut inventory = Inventory::default();
        let uid = inventory
            .add_cosmetic(&catalog(), CosmeticSlot::Pet, 3, 10)
            .unwrap();

        inventory.pets.set_active(uid, true).unwrap();
        assert_eq!(inventory.pets.items_by_state(true).count(), 1);

        let missing = Uuid::new_v4();
        assert!(matches!(
            inventory.pets.set_active(missing, true),
            Err(InventoryError::NotOwned(_))
        ));
    }

    #[test]
    fn products_stack_up_to_their_cap() {
        let mut inventory = Inventory::default();
        let catalog = catalog();

        assert_eq!(inventory.add_product(&catalog, 77, 3).unwrap(), 3);
        assert_eq!(inventory.add_product(&catalog, 77, 2).unwrap(), 5);
        assert_eq!(
            inventory.add_product(&catalog, 77, 1).unwrap_err(),
            InventoryError::ProductCap {
                id: 77,
                requested: 6,
                cap: 5
            }
        );
        assert_eq!(inventory.products.get(77).unwrap().amount, 5);
    }

    #[test]
    fn validate_flags_items_missing_from_the_catalog() {
        let catalog = catalog();
        let mut inventory = Inventory::default();
        inventory.trails.replace_all([InventoryItem {
            uid: Uuid::new_v4(),
            type_id: 3,
            active: true,
        }]);

        assert_eq!(
            inventory.validate(&catalog, 10),
            Err(InventoryError::UnknownCosmetic {
                slot: CosmeticSlot::Trail,
                id: 3
            })
        );

        inventory.trails.replace_all(Vec::new());
        inventory.products.replace_all([PlayerProduct { id: 77, amount: 9 }]);
        assert!(matches!(
            inventory.validate(&catalog, 10),
            Err(InventoryError::ProductCap { id: 77, .. })
        ));
    }

    #[test]
    fn removing_the_last_units_drops_the_stack() {
        let mut inventory = Inventory::default();
        inventory.add_product(&catalog(), 77, 2).unwrap();

        assert_eq!(inventory.products.remove_amount(77, 1).unwrap(), 1);
        assert_eq!(inventory.products.remove_amount(77, 4).unwrap(), 0);
        assert!(inventory.products.is_empty());
    }
}
