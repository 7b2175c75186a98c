//! Server-sent event stream of lifecycle events.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(stream_events))
}

/// Each SSE message carries one envelope as JSON. A subscriber that falls
/// behind skips the events it missed and sees a gap in `event_id`.
async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events().subscribe()).filter_map(|item| match item {
        Ok(envelope) => match Event::default()
            .event(envelope.event_type.as_str())
            .id(envelope.event_id.to_string())
            .json_data(&envelope)
        {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!(event_id = %envelope.event_id, error = %e, "Failed to encode event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Event subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
