use utoipa::OpenApi;

/// OpenAPI document of the REST surface.
#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Bravo Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::player::get_player,
        crate::routes::player::handle_player,
        crate::routes::player::update_player,
        crate::routes::player::update_players,
        crate::routes::player::grant_item,
        crate::routes::player::adjust_currency,
        crate::routes::player::flush_players,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::player::PlayerPayload,
            crate::dto::player::InventoryPayload,
            crate::dto::player::ItemPayload,
            crate::dto::player::ProductPayload,
            crate::dto::player::PlayerUpdatesRequest,
            crate::dto::player::PlayerUpdateResult,
            crate::dto::player::PlayerUpdatesResponse,
            crate::dto::player::GrantItemRequest,
            crate::dto::player::GrantItemResponse,
            crate::dto::player::CurrencyOperation,
            crate::dto::player::CurrencyAdjustmentRequest,
            crate::dto::player::CurrencyBalanceResponse,
            crate::dto::player::FlushResponse,
            crate::state::player::CurrencyType,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "player", description = "Cached player state used by game servers"),
    )
)]
pub struct ApiDoc;
