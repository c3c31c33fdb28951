/// Board event stream (SSE)
///
/// Every accepted mutation, from any user, is pushed to every connected
/// stream, the author's own included.
///
/// # Endpoint
///
/// `GET /api/events`
///
/// # SSE Event Format
///
/// ```text
/// event: taskUpdated
/// data: {"type":"taskUpdated","data":{"id":"...","version":3,...}}
///
/// event: taskDeleted
/// data: {"type":"taskDeleted","data":"3f1c..."}
/// ```
///
/// There is no replay. Events published while a client is disconnected are
/// gone; clients re-fetch `GET /api/tasks` after (re)connecting. A client too
/// slow to keep up skips the events it lagged behind on.
///
/// # Example
///
/// ```bash
/// curl -N -H "Authorization: Bearer <token>" http://localhost:3000/api/events
/// ```

use crate::app::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use taskboard_shared::auth::middleware::AuthContext;
use taskboard_shared::events::BoardEvent;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt as _;
use uuid::Uuid;

/// Keep-alive comment interval
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Stream board events to the caller
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    let user_id = auth.user_id;

    tracing::info!(
        user_id = %user_id,
        subscribers = state.hub.subscriber_count(),
        "Event stream opened"
    );

    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) => to_sse(&event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            lagged(user_id, skipped);
            None
        }
    });

    Sse::new(stream.map(Ok)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn lagged(user_id: Uuid, skipped: u64) {
    tracing::warn!(
        user_id = %user_id,
        skipped,
        "Event stream lagged; client will miss events until it refreshes"
    );
}

/// Encodes a board event as an SSE frame named after the event
pub fn to_sse(event: &BoardEvent) -> Option<Event> {
    match Event::default().event(event.name()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, event = event.name(), "Failed to encode event");
            None
        }
    }
}
