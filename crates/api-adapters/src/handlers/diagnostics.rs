use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::state::AppState;

/// GET /api/v1/diagnostics/stream
///
/// Every permission denial as a `permission-denied` SSE event. Events missed
/// by a lagging client are skipped.
pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(state.diagnostics.subscribe()).filter_map(|item| {
        let event = item.ok()?;
        Event::default().event("permission-denied").json_data(&event).ok().map(Ok)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
