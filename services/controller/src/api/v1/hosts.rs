//! Host endpoints.
//!
//! Host agents call `POST /v1/hosts` when they start. Registering an id the
//! controller already knows runs the reattachment sweep for its servers.

use axum::{extract::State, routing::get, Json, Router};
use fleet_id::{HostId, ServerId};
use fleet_model::HostDescriptor;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

/// Hosts live at /v1/hosts.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_hosts).post(attach_host))
}

/// Omitting `id` registers a new host under a fresh id.
#[derive(Debug, Deserialize)]
pub struct AttachHostRequest {
    #[serde(default)]
    pub id: Option<HostId>,
    pub address: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct AttachHostResponse {
    #[serde(flatten)]
    pub host: HostDescriptor,
    pub reattached: Vec<ServerId>,
    pub purged: Vec<ServerId>,
}

async fn list_hosts(State(state): State<AppState>) -> Json<Vec<HostDescriptor>> {
    Json(state.orchestrator().hosts().list())
}

async fn attach_host(
    State(state): State<AppState>,
    Json(req): Json<AttachHostRequest>,
) -> Result<Json<AttachHostResponse>, ApiError> {
    if req.address.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_host", "address cannot be empty"));
    }
    if !(req.endpoint.starts_with("http://") || req.endpoint.starts_with("https://")) {
        return Err(ApiError::bad_request(
            "invalid_host",
            "endpoint must be an http(s) URL",
        ));
    }

    let descriptor = HostDescriptor {
        id: req.id.unwrap_or_default(),
        address: req.address.trim().to_string(),
        endpoint: req.endpoint.trim_end_matches('/').to_string(),
    };

    let (host, report) = state.orchestrator().attach_host(descriptor).await?;
    Ok(Json(AttachHostResponse {
        host,
        reattached: report.reattached,
        purged: report.purged,
    }))
}
