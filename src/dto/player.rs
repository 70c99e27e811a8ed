use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::state::player::{
    CurrencyType, Inventory, InventoryItem, ItemInventory, Player, PlayerId, PlayerPatch,
    PlayerProduct, ProductInventory, SettingType, StatType, StatisticType,
};

/// Wire representation of a player, used both for reads and for game-server
/// pushes. On push, every section present replaces the cached one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
pub struct PlayerPayload {
    /// External user id.
    pub id: i64,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64))]
    pub name: Option<String>,
    /// Owned pets, trails and products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub inventory: Option<InventoryPayload>,
    /// Currency balances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>, example = json!({"GOLD": 100.0}))]
    pub currencies: Option<BTreeMap<CurrencyType, f64>>,
    /// Progression stats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>, example = json!({"LEVEL": 3.0}))]
    pub stats: Option<BTreeMap<StatType, f64>>,
    /// Lifetime statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>, example = json!({"WIN": 12.0}))]
    pub statistics: Option<BTreeMap<StatisticType, f64>>,
    /// Client preferences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>, example = json!({"MUSIC": 0}))]
    pub settings: Option<BTreeMap<SettingType, i32>>,
}

/// Every inventory section of a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct InventoryPayload {
    /// Owned pets, in acquisition order.
    #[serde(default)]
    #[validate(custom(function = "validate_unique_uids"))]
    pub pets: Vec<ItemPayload>,
    /// Owned trails, in acquisition order.
    #[serde(default)]
    #[validate(custom(function = "validate_unique_uids"))]
    pub trails: Vec<ItemPayload>,
    /// Product stacks.
    #[serde(default)]
    #[validate(custom(function = "validate_unique_product_ids"))]
    pub products: Vec<ProductPayload>,
}

/// Owned pet or trail instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemPayload {
    /// Unique id of this instance.
    pub uid: Uuid,
    /// Catalog id of the cosmetic.
    pub id: u32,
    /// Whether the item is equipped.
    #[serde(default)]
    pub active: bool,
}

/// Product stack; one entry per product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductPayload {
    /// Catalog id of the product.
    pub id: i64,
    /// Units held. Zero drops the stack.
    pub amount: u32,
}

fn validate_unique_uids(items: &[ItemPayload]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    if items.iter().all(|item| seen.insert(item.uid)) {
        return Ok(());
    }
    let mut err = ValidationError::new("duplicate_uid");
    err.message = Some("item uids must be unique within an inventory".into());
    Err(err)
}

fn validate_unique_product_ids(products: &[ProductPayload]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::with_capacity(products.len());
    if products.iter().all(|product| seen.insert(product.id)) {
        return Ok(());
    }
    let mut err = ValidationError::new("duplicate_product");
    err.message = Some("product ids must be unique within an inventory".into());
    Err(err)
}

impl From<&Player> for PlayerPayload {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id().0,
            name: Some(player.name.clone()),
            inventory: Some((&player.inventory).into()),
            currencies: Some(player.currencies.iter().collect()),
            stats: Some(player.stats.iter().collect()),
            statistics: Some(player.statistics.iter().collect()),
            settings: Some(player.settings.iter().collect()),
        }
    }
}

impl From<&Inventory> for InventoryPayload {
    fn from(inventory: &Inventory) -> Self {
        fn items(inventory: &ItemInventory) -> Vec<ItemPayload> {
            inventory
                .items()
                .map(|item| ItemPayload {
                    uid: item.uid,
                    id: item.type_id,
                    active: item.active,
                })
                .collect()
        }

        Self {
            pets: items(&inventory.pets),
            trails: items(&inventory.trails),
            products: inventory
                .products
                .items()
                .map(|product| ProductPayload {
                    id: product.id,
                    amount: product.amount,
                })
                .collect(),
        }
    }
}

impl From<InventoryPayload> for Inventory {
    fn from(payload: InventoryPayload) -> Self {
        let items = |items: Vec<ItemPayload>| {
            ItemInventory::from_items(items.into_iter().map(|item| InventoryItem {
                uid: item.uid,
                type_id: item.id,
                active: item.active,
            }))
        };

        Inventory {
            pets: items(payload.pets),
            trails: items(payload.trails),
            products: ProductInventory::from_items(
                payload
                    .products
                    .into_iter()
                    .filter(|product| product.amount > 0)
                    .map(|product| PlayerProduct {
                        id: product.id,
                        amount: product.amount,
                    }),
            ),
        }
    }
}

impl PlayerPayload {
    /// Split into the target player and the replacement to apply.
    pub fn into_patch(self) -> (PlayerId, PlayerPatch) {
        (
            PlayerId(self.id),
            PlayerPatch {
                name: self.name,
                inventory: self.inventory.map(Into::into),
                currencies: self.currencies,
                stats: self.stats,
                statistics: self.statistics,
                settings: self.settings,
            },
        )
    }
}

/// Lookup of a player already held in memory.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlayerQuery {
    /// External user id.
    pub id: i64,
}

/// Load-or-create request.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct HandleQuery {
    /// External user id.
    pub id: i64,
    /// Display name; refreshes the cached name when provided.
    #[validate(length(max = 64))]
    pub name: Option<String>,
    /// Create the player when it does not exist yet.
    #[serde(default)]
    pub insert: bool,
}

/// Batch of game-server pushes.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerUpdatesRequest {
    /// Pushes, applied in order.
    #[validate(length(min = 1, max = 1000), nested)]
    pub players: Vec<PlayerPayload>,
}

/// Result of one push inside a batch.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerUpdateResult {
    /// Player the push targeted.
    pub id: i64,
    /// `updated`, `not_found` or `rejected`.
    pub status: String,
    /// Reason for a non-`updated` status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-player outcome of a batch push.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerUpdatesResponse {
    /// One entry per push, in request order.
    pub results: Vec<PlayerUpdateResult>,
}

/// Item granted to a player.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantItemRequest {
    /// A new pet instance of the given catalog id.
    Pet { type_id: u32 },
    /// A new trail instance of the given catalog id.
    Trail { type_id: u32 },
    /// Units merged into the product's stack.
    Product { id: i64, amount: u32 },
}

impl Validate for GrantItemRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let GrantItemRequest::Product { amount: 0, .. } = self {
            let mut err = ValidationError::new("amount_range");
            err.message = Some("product amount must be at least 1".into());
            errors.add("amount", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// What the player received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrantItemResponse {
    /// Pet created under `uid`.
    Pet { uid: Uuid, type_id: u32 },
    /// Trail created under `uid`.
    Trail { uid: Uuid, type_id: u32 },
    /// `amount` is the resulting stack size.
    Product { id: i64, amount: u32 },
}

/// How a currency adjustment combines with the current balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyOperation {
    /// Increase the balance.
    Add,
    /// Decrease the balance, stopping at zero.
    Remove,
    /// Overwrite the balance.
    Set,
}

/// Currency change. Balances never drop below zero.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CurrencyAdjustmentRequest {
    /// Balance to change.
    pub currency: CurrencyType,
    /// How `amount` is applied.
    pub operation: CurrencyOperation,
    /// Non-negative, finite amount.
    #[validate(range(min = 0.0))]
    pub amount: f64,
}

/// Balance after an adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CurrencyBalanceResponse {
    /// Adjusted currency.
    pub currency: CurrencyType,
    /// Resulting balance.
    pub balance: f64,
}

/// Outcome of an on-demand flush.
#[derive(Debug, Serialize, ToSchema)]
pub struct FlushResponse {
    /// `idle`, `single`, `batch`, `failed` or `skipped`.
    pub outcome: String,
    /// Players written by this flush.
    pub written: usize,
    /// Evicted players released after their final write.
    pub released: usize,
    /// RFC 3339 completion time.
    pub flushed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_reflects_every_section() {
        let mut player = Player::new(PlayerId(42), "Ada");
        player.currencies.set(CurrencyType::Gold, 12.5);
        player.settings.set(SettingType::Music, 0);

        let payload = PlayerPayload::from(&player);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["id"], 42);
        assert_eq!(json["currencies"]["GOLD"], 12.5);
        assert_eq!(json["settings"]["MUSIC"], 0);
        assert_eq!(json["inventory"]["pets"], serde_json::json!([]));
    }

    #[test]
    fn unknown_keys_are_rejected_at_the_boundary() {
        let result = serde_json::from_str::<PlayerPayload>(
            r#"{ "id": 1, "currencies": { "SILVER": 3 } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn absent_sections_are_left_out_of_the_patch() {
        let payload: PlayerPayload =
            serde_json::from_str(r#"{ "id": 9, "stats": { "LEVEL": 4 } }"#).unwrap();
        let (id, patch) = payload.into_patch();

        assert_eq!(id, PlayerId(9));
        assert!(patch.name.is_none());
        assert!(patch.inventory.is_none());
        assert_eq!(patch.stats.unwrap().get(&StatType::Level), Some(&4.0));
    }

    #[test]
    fn duplicate_item_uids_fail_validation() {
        let uid = Uuid::new_v4();
        let payload = PlayerPayload {
            id: 1,
            name: None,
            inventory: Some(InventoryPayload {
                pets: vec![
                    ItemPayload {
                        uid,
                        id: 1,
                        active: false,
                    },
                    ItemPayload {
                        uid,
                        id: 2,
                        active: true,
                    },
                ],
                ..InventoryPayload::default()
            }),
            currencies: None,
            stats: None,
            statistics: None,
            settings: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn duplicate_product_ids_fail_validation() {
        let payload: PlayerPayload = serde_json::from_str(
            r#"{ "id": 1, "inventory": { "products": [
                { "id": 1001, "amount": 2 },
                { "id": 1001, "amount": 3 }
            ] } }"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());

        let distinct: PlayerPayload = serde_json::from_str(
            r#"{ "id": 1, "inventory": { "products": [
                { "id": 1001, "amount": 2 },
                { "id": 1002, "amount": 3 }
            ] } }"#,
        )
        .unwrap();
        assert!(distinct.validate().is_ok());
    }

    #[test]
    fn grant_requests_are_tagged() {
        let request: GrantItemRequest =
            serde_json::from_str(r#"{ "kind": "product", "id": 1001, "amount": 0 }"#).unwrap();
        assert!(request.validate().is_err());

        let request: GrantItemRequest =
            serde_json::from_str(r#"{ "kind": "trail", "type_id": 2 }"#).unwrap();
        assert!(request.validate().is_ok());
    }
}
