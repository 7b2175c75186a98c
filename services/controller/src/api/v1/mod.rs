//! API v1 routes.

mod events;
mod groups;
mod hosts;
mod servers;

use axum::Router;
use serde::Deserialize;

use crate::state::AppState;

/// `?type=` filter shared by the group and server listings.
#[derive(Debug, Default, Deserialize)]
pub struct TypeFilter {
    #[serde(rename = "type")]
    pub server_type: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/groups", groups::routes())
        .nest("/servers", servers::routes())
        .nest("/hosts", hosts::routes())
        .nest("/events", events::routes())
}
