use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the ringside relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::history::list_players,
        crate::routes::history::register_player,
        crate::routes::history::get_player,
        crate::routes::history::list_matches,
        crate::routes::history::get_match,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::history::PlayerSummary,
            crate::dto::history::MatchSummary,
            crate::dto::history::RegisterPlayerRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "history", description = "Player and match history"),
        (name = "scoreboard", description = "WebSocket relay for scoreboard clients"),
    )
)]
pub struct ApiDoc;
