use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::history::{MatchSummary, PlayerSummary, RegisterPlayerRequest},
    error::AppError,
    services::history_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/players",
    tag = "history",
    responses((status = 200, description = "All known competitors", body = [PlayerSummary]))
)]
/// List every competitor the history store knows about.
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlayerSummary>>, AppError> {
    let players = history_service::list_players(&state).await?;
    Ok(Json(players))
}

#[utoipa::path(
    post,
    path = "/players",
    tag = "history",
    request_body = RegisterPlayerRequest,
    responses(
        (status = 200, description = "Competitor registered", body = PlayerSummary),
        (status = 409, description = "Name already registered"),
    )
)]
/// Register a competitor name ahead of a match.
pub async fn register_player(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<RegisterPlayerRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    let player = history_service::register_player(&state, request.name).await?;
    Ok(Json(player))
}

#[utoipa::path(
    get,
    path = "/players/{name}",
    tag = "history",
    params(("name" = String, Path, description = "Competitor name")),
    responses(
        (status = 200, description = "Competitor statistics", body = PlayerSummary),
        (status = 404, description = "Unknown competitor"),
    )
)]
/// Statistics for one competitor.
pub async fn get_player(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<PlayerSummary>, AppError> {
    let player = history_service::get_player(&state, &name).await?;
    Ok(Json(player))
}

#[utoipa::path(
    get,
    path = "/matches",
    tag = "history",
    responses((status = 200, description = "All recorded matches", body = [MatchSummary]))
)]
/// List every recorded match, oldest first.
pub async fn list_matches(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    let matches = history_service::list_matches(&state).await?;
    Ok(Json(matches))
}

#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "history",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Recorded match", body = MatchSummary),
        (status = 404, description = "Unknown match"),
    )
)]
/// One recorded match by id.
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let record = history_service::get_match(&state, id).await?;
    Ok(Json(record))
}

/// Configure the history routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/players", get(list_players).post(register_player))
        .route("/players/{name}", get(get_player))
        .route("/matches", get(list_matches))
        .route("/matches/{id}", get(get_match))
}
