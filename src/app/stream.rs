use crate::broker::StreamEvent;
use crate::state;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tracing::warn;

/// Opens the push stream. Without identity the stream ends immediately.
pub(crate) async fn subscribe(
    State(state): State<state::AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = state.auth.identify(&headers);
    let session = state.alerts.subscribe(user_id).await;
    let events = session
        .into_events(state.time, state.config.notify.session_timeout())
        .filter_map(|event| futures::future::ready(sse_event(&event)))
        .map(Ok);
    Sse::new(events)
}

fn sse_event(event: &StreamEvent) -> Option<Event> {
    let data = match event.data() {
        Ok(data) => data,
        Err(err) => {
            warn!(event = event.name(), "failed to encode stream event: {err}");
            return None;
        }
    };
    let sse = Event::default().event(event.name()).data(data);
    match event {
        StreamEvent::Heartbeat => Some(sse.comment("keep-alive")),
        _ => Some(sse),
    }
}
