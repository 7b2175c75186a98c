//! Group endpoints.
//!
//! Group definitions are passed straight through to the group repository.
//! Server lookups by group read the server store, and stopping by numeric id
//! goes through the orchestrator.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use fleet_events::Cause;
use fleet_model::{Group, Server};
use tracing::info;

use super::TypeFilter;
use crate::api::error::ApiError;
use crate::state::AppState;

/// Groups live at /v1/groups.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route(
            "/{name}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/{name}/servers", get(list_group_servers))
        .route(
            "/{name}/servers/{numeric_id}",
            get(get_group_server).delete(stop_group_server),
        )
}

async fn list_groups(
    State(state): State<AppState>,
    Query(filter): Query<TypeFilter>,
) -> Result<Json<Vec<Group>>, ApiError> {
    let groups = state.orchestrator().groups().load_groups()?;
    let groups = match filter.server_type {
        Some(server_type) => groups
            .into_iter()
            .filter(|g| g.server_type == server_type)
            .collect(),
        None => groups,
    };
    Ok(Json(groups))
}

async fn create_group(
    State(state): State<AppState>,
    Json(group): Json<Group>,
) -> Result<impl IntoResponse, ApiError> {
    group
        .validate()
        .map_err(|e| ApiError::bad_request("invalid_group", e.to_string()))?;

    let repo = state.orchestrator().groups();
    if repo.find_group(&group.name)?.is_some() {
        return Err(ApiError::conflict(
            "group_exists",
            format!("group {} already exists", group.name),
        ));
    }

    repo.save_group(&group)?;
    info!(group = %group.name, server_type = %group.server_type, "Group created");
    Ok((StatusCode::CREATED, Json(group)))
}

async fn get_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Group>, ApiError> {
    state
        .orchestrator()
        .groups()
        .find_group(&name)?
        .map(Json)
        .ok_or_else(|| group_not_found(&name))
}

async fn update_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(group): Json<Group>,
) -> Result<Json<Group>, ApiError> {
    if group.name != name {
        return Err(ApiError::bad_request(
            "name_mismatch",
            format!("body names group {} but path names {name}", group.name),
        ));
    }
    group
        .validate()
        .map_err(|e| ApiError::bad_request("invalid_group", e.to_string()))?;

    let repo = state.orchestrator().groups();
    if repo.find_group(&name)?.is_none() {
        return Err(group_not_found(&name));
    }

    repo.save_group(&group)?;
    info!(group = %name, "Group updated");
    Ok(Json(group))
}

/// Deleting a group leaves its running servers alone.
async fn delete_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.orchestrator().groups().delete_group(&name)? {
        return Err(group_not_found(&name));
    }
    info!(group = %name, "Group deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_group_servers(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<Vec<Server>> {
    Json(state.orchestrator().store().by_group(&name))
}

async fn get_group_server(
    State(state): State<AppState>,
    Path((name, numeric_id)): Path<(String, u32)>,
) -> Result<Json<Server>, ApiError> {
    state
        .orchestrator()
        .store()
        .by_numeric(&name, numeric_id)
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found("server_not_found", format!("server {name}-{numeric_id} not found"))
        })
}

async fn stop_group_server(
    State(state): State<AppState>,
    Path((name, numeric_id)): Path<(String, u32)>,
) -> Result<Json<Server>, ApiError> {
    let server = state
        .orchestrator()
        .stop_by_numeric(&name, numeric_id, Cause::Api)
        .await?;
    Ok(Json(server))
}

fn group_not_found(name: &str) -> ApiError {
    ApiError::not_found("group_not_found", format!("group not found: {name}"))
}
