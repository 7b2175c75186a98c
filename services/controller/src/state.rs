//! Application state shared across request handlers.

use std::sync::Arc;

use crate::events::BroadcastEventSink;
use crate::orchestrator::ServerOrchestrator;
use crate::store::Database;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: Arc<Database>,
    orchestrator: ServerOrchestrator,
    events: Arc<BroadcastEventSink>,
    api_token: Option<String>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        orchestrator: ServerOrchestrator,
        events: Arc<BroadcastEventSink>,
        api_token: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                db,
                orchestrator,
                events,
                api_token,
            }),
        }
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn orchestrator(&self) -> &ServerOrchestrator {
        &self.inner.orchestrator
    }

    pub fn events(&self) -> &BroadcastEventSink {
        &self.inner.events
    }

    /// Token callers must present, if any.
    pub fn api_token(&self) -> Option<&str> {
        self.inner.api_token.as_deref()
    }
}
