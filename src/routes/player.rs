use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        now_rfc3339,
        player::{
            CurrencyAdjustmentRequest, CurrencyBalanceResponse, FlushResponse, GrantItemRequest,
            GrantItemResponse, HandleQuery, PlayerPayload, PlayerQuery, PlayerUpdatesRequest,
            PlayerUpdatesResponse,
        },
    },
    error::AppError,
    services::{player_service, scheduler},
    state::{SharedState, player::PlayerId},
};

/// Routes used by game servers to pull and push player state.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/player", get(get_player))
        .route("/api/v1/player/handle", get(handle_player))
        .route("/api/v1/player/update", post(update_player))
        .route("/api/v1/player/updates", post(update_players))
        .route("/api/v1/player/flush", post(flush_players))
        .route("/api/v1/player/{id}/inventory", post(grant_item))
        .route("/api/v1/player/{id}/currencies", post(adjust_currency))
}

/// Return a player currently held in memory.
#[utoipa::path(
    get,
    path = "/api/v1/player",
    tag = "player",
    params(PlayerQuery),
    responses(
        (status = 200, description = "Cached player", body = PlayerPayload),
        (status = 404, description = "Player not loaded")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Query(query): Query<PlayerQuery>,
) -> Result<Json<PlayerPayload>, AppError> {
    let player = player_service::find_cached(&state, PlayerId(query.id)).await?;
    Ok(Json(player))
}

/// Load a player from memory or storage, creating it when `insert` is set.
#[utoipa::path(
    get,
    path = "/api/v1/player/handle",
    tag = "player",
    params(HandleQuery),
    responses(
        (status = 200, description = "Player loaded or created", body = PlayerPayload),
        (status = 404, description = "Player does not exist and insertion was not requested"),
        (status = 500, description = "Stored record is malformed"),
        (status = 503, description = "Storage unavailable or timed out")
    )
)]
pub async fn handle_player(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<HandleQuery>>,
) -> Result<Json<PlayerPayload>, AppError> {
    let player = player_service::handle(&state, query).await?;
    Ok(Json(player))
}

/// Replace the pushed sections of a cached player.
#[utoipa::path(
    post,
    path = "/api/v1/player/update",
    tag = "player",
    request_body = PlayerPayload,
    responses(
        (status = 200, description = "Update applied", body = PlayerPayload),
        (status = 400, description = "Unknown catalog entry"),
        (status = 404, description = "Player not loaded"),
        (status = 409, description = "Inventory over capacity")
    )
)]
pub async fn update_player(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<PlayerPayload>>,
) -> Result<Json<PlayerPayload>, AppError> {
    let player = player_service::apply_update(&state, payload).await?;
    Ok(Json(player))
}

/// Apply a batch of pushes, reporting the result of each.
#[utoipa::path(
    post,
    path = "/api/v1/player/updates",
    tag = "player",
    request_body = PlayerUpdatesRequest,
    responses(
        (status = 200, description = "Per-player results", body = PlayerUpdatesResponse)
    )
)]
pub async fn update_players(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<PlayerUpdatesRequest>>,
) -> Json<PlayerUpdatesResponse> {
    Json(player_service::apply_updates(&state, request.players).await)
}

/// Grant a pet, trail or product to a cached player.
#[utoipa::path(
    post,
    path = "/api/v1/player/{id}/inventory",
    tag = "player",
    params(("id" = i64, Path, description = "External user id")),
    request_body = GrantItemRequest,
    responses(
        (status = 200, description = "Item granted", body = GrantItemResponse),
        (status = 400, description = "Unknown catalog entry"),
        (status = 404, description = "Player not loaded"),
        (status = 409, description = "Inventory full or product cap reached")
    )
)]
pub async fn grant_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Valid(Json(request)): Valid<Json<GrantItemRequest>>,
) -> Result<Json<GrantItemResponse>, AppError> {
    let granted = player_service::grant_item(&state, PlayerId(id), request).await?;
    Ok(Json(granted))
}

/// Add, remove or set a currency balance on a cached player.
#[utoipa::path(
    post,
    path = "/api/v1/player/{id}/currencies",
    tag = "player",
    params(("id" = i64, Path, description = "External user id")),
    request_body = CurrencyAdjustmentRequest,
    responses(
        (status = 200, description = "New balance", body = CurrencyBalanceResponse),
        (status = 404, description = "Player not loaded")
    )
)]
pub async fn adjust_currency(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Valid(Json(request)): Valid<Json<CurrencyAdjustmentRequest>>,
) -> Result<Json<CurrencyBalanceResponse>, AppError> {
    let balance = player_service::adjust_currency(&state, PlayerId(id), request).await?;
    Ok(Json(balance))
}

/// Write every cached player to storage now.
#[utoipa::path(
    post,
    path = "/api/v1/player/flush",
    tag = "player",
    responses(
        (status = 200, description = "Flush attempted", body = FlushResponse)
    )
)]
pub async fn flush_players(State(state): State<SharedState>) -> Json<FlushResponse> {
    let (outcome, released) = scheduler::flush_all(&state).await;
    Json(FlushResponse {
        outcome: outcome.as_str().to_owned(),
        written: outcome.written(),
        released,
        flushed_at: now_rfc3339(),
    })
}
