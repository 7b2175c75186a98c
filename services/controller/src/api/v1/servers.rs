//! Server endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use fleet_events::Cause;
use fleet_id::ServerId;
use fleet_model::{Server, ServerState};
use serde::Deserialize;

use super::TypeFilter;
use crate::api::error::ApiError;
use crate::state::AppState;

/// Servers live at /v1/servers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_servers).post(start_server))
        .route("/{server_id}", get(get_server).delete(stop_server))
        .route("/{server_id}/state", put(update_state))
        .route("/{server_id}/properties/{key}", put(update_property))
}

#[derive(Debug, Deserialize)]
pub struct StartServerRequest {
    pub group: String,
    #[serde(default)]
    pub cause: Cause,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePropertyRequest {
    pub value: String,
}

fn parse_server_id(raw: &str) -> Result<ServerId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::bad_request("invalid_server_id", format!("{raw}: {e}")))
}

async fn list_servers(
    State(state): State<AppState>,
    Query(filter): Query<TypeFilter>,
) -> Json<Vec<Server>> {
    let store = state.orchestrator().store();
    Json(match filter.server_type {
        Some(server_type) => store.by_type(&server_type),
        None => store.all(),
    })
}

async fn start_server(
    State(state): State<AppState>,
    Json(req): Json<StartServerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let server = state
        .orchestrator()
        .start_server(&req.group, req.cause)
        .await?;
    Ok((StatusCode::CREATED, Json(server)))
}

async fn get_server(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Result<Json<Server>, ApiError> {
    let id = parse_server_id(&server_id)?;
    state
        .orchestrator()
        .store()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("server_not_found", format!("server not found: {id}")))
}

async fn stop_server(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Result<Json<Server>, ApiError> {
    let id = parse_server_id(&server_id)?;
    let server = state.orchestrator().stop_server(id, Cause::Api).await?;
    Ok(Json(server))
}

async fn update_state(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
    Json(req): Json<UpdateStateRequest>,
) -> Result<Json<Server>, ApiError> {
    let id = parse_server_id(&server_id)?;
    if req.state.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_state", "state cannot be empty"));
    }

    let server = state
        .orchestrator()
        .update_server_state(id, ServerState::from(req.state.as_str()))?;
    Ok(Json(server))
}

async fn update_property(
    State(state): State<AppState>,
    Path((server_id, key)): Path<(String, String)>,
    Json(req): Json<UpdatePropertyRequest>,
) -> Result<Json<Server>, ApiError> {
    let id = parse_server_id(&server_id)?;
    let server = state
        .orchestrator()
        .update_server_property(id, &key, &req.value)?;
    Ok(Json(server))
}
