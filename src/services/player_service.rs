//! Player operations behind the HTTP layer: load-or-create, pushes from the
//! game server and targeted mutations.

use tracing::{debug, info, warn};

use crate::{
    dao::player_store::InsertOutcome,
    dto::player::{
        CurrencyAdjustmentRequest, CurrencyBalanceResponse, CurrencyOperation, GrantItemRequest,
        GrantItemResponse, HandleQuery, PlayerPayload, PlayerUpdateResult, PlayerUpdatesResponse,
    },
    error::ServiceError,
    state::{
        SharedState,
        catalog::CosmeticSlot,
        player::{Player, PlayerHandle, PlayerId},
    },
};

/// Player already held in memory, live or waiting for its final write.
fn cached(state: &SharedState, id: PlayerId) -> Result<PlayerHandle, ServiceError> {
    let directory = state.directory();
    directory
        .resolve(id)
        .or_else(|| directory.reclaim_parked(id))
        .ok_or_else(|| ServiceError::NotFound(format!("player {id} is not loaded")))
}

/// Return a cached player without touching storage.
pub async fn find_cached(state: &SharedState, id: PlayerId) -> Result<PlayerPayload, ServiceError> {
    let handle = cached(state, id)?;
    let player = handle.read().await;
    Ok(PlayerPayload::from(&*player))
}

/// Resolve a player, loading it from storage or creating it when allowed.
pub async fn handle(state: &SharedState, query: HandleQuery) -> Result<PlayerPayload, ServiceError> {
    let id = PlayerId(query.id);
    let handle = load_or_create(state, id, query.name.as_deref(), query.insert).await?;

    let mut player = handle.write().await;
    if let Some(name) = query.name
        && player.name != name
    {
        player.name = name;
    }
    Ok(PlayerPayload::from(&*player))
}

async fn load_or_create(
    state: &SharedState,
    id: PlayerId,
    name: Option<&str>,
    insert: bool,
) -> Result<PlayerHandle, ServiceError> {
    let directory = state.directory();
    if let Some(handle) = directory.resolve(id) {
        debug!(player_id = %id, "player cache hit");
        return Ok(handle);
    }
    if let Some(handle) = directory.reclaim_parked(id) {
        return Ok(handle);
    }

    debug!(player_id = %id, "player cache miss");
    let synchronizer = state.synchronizer().await?;

    if let Some(player) = synchronizer.load_existing(id).await? {
        debug!(player_id = %id, "player hydrated from storage");
        return Ok(directory.insert(player));
    }

    if !insert {
        return Err(ServiceError::NotFound(format!(
            "player {id} does not exist and insertion was not requested"
        )));
    }

    let player = Player::new(id, name.unwrap_or_default());
    match synchronizer.create_if_absent(&player).await? {
        InsertOutcome::Inserted => {
            info!(player_id = %id, "player created");
            Ok(directory.insert(player))
        }
        InsertOutcome::AlreadyExists => {
            // Someone else created the record between our lookup and insert.
            let stored = synchronizer.load_existing(id).await?.unwrap_or(player);
            Ok(directory.insert(stored))
        }
    }
}

/// Replace the sections present in `payload` on a cached player.
pub async fn apply_update(
    state: &SharedState,
    payload: PlayerPayload,
) -> Result<PlayerPayload, ServiceError> {
    let (id, patch) = payload.into_patch();
    let handle = cached(state, id)?;
    patch.validate(state.catalog(), state.config().inventory_size)?;

    let mut player = handle.write().await;
    player.apply_update(patch);
    debug!(player_id = %id, "player update applied");
    Ok(PlayerPayload::from(&*player))
}

/// Apply several pushes; each one succeeds or fails on its own.
pub async fn apply_updates(
    state: &SharedState,
    payloads: Vec<PlayerPayload>,
) -> PlayerUpdatesResponse {
    let mut results = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let id = payload.id;
        let result = match apply_update(state, payload).await {
            Ok(_) => PlayerUpdateResult {
                id,
                status: "updated".into(),
                message: None,
            },
            Err(ServiceError::NotFound(message)) => PlayerUpdateResult {
                id,
                status: "not_found".into(),
                message: Some(message),
            },
            Err(err) => {
                warn!(player_id = id, error = %err, "player update rejected");
                PlayerUpdateResult {
                    id,
                    status: "rejected".into(),
                    message: Some(err.to_string()),
                }
            }
        };
        results.push(result);
    }
    PlayerUpdatesResponse { results }
}

/// Grant a pet, a trail or product units to a cached player.
pub async fn grant_item(
    state: &SharedState,
    id: PlayerId,
    request: GrantItemRequest,
) -> Result<GrantItemResponse, ServiceError> {
    let handle = cached(state, id)?;
    let catalog = state.catalog();
    let capacity = state.config().inventory_size;
    let mut player = handle.write().await;

    let granted = match request {
        GrantItemRequest::Pet { type_id } => GrantItemResponse::Pet {
            uid: player
                .inventory
                .add_cosmetic(catalog, CosmeticSlot::Pet, type_id, capacity)?,
            type_id,
        },
        GrantItemRequest::Trail { type_id } => GrantItemResponse::Trail {
            uid: player
                .inventory
                .add_cosmetic(catalog, CosmeticSlot::Trail, type_id, capacity)?,
            type_id,
        },
        GrantItemRequest::Product { id: product, amount } => GrantItemResponse::Product {
            id: product,
            amount: player.inventory.add_product(catalog, product, amount)?,
        },
    };
    debug!(player_id = %id, ?granted, "item granted");
    Ok(granted)
}

/// Add, remove or overwrite a currency balance. Balances bottom out at zero.
pub async fn adjust_currency(
    state: &SharedState,
    id: PlayerId,
    request: CurrencyAdjustmentRequest,
) -> Result<CurrencyBalanceResponse, ServiceError> {
    if !request.amount.is_finite() {
        return Err(ServiceError::InvalidInput("amount must be finite".into()));
    }

    let handle = cached(state, id)?;
    let mut player = handle.write().await;
    let currencies = &mut player.currencies;
    let balance = match request.operation {
        CurrencyOperation::Add => currencies.add(request.currency, request.amount),
        CurrencyOperation::Remove => currencies.remove(request.currency, request.amount),
        CurrencyOperation::Set => {
            currencies.set(request.currency, request.amount);
            currencies.get(request.currency)
        }
    };

    Ok(CurrencyBalanceResponse {
        currency: request.currency,
        balance,
    })
}
